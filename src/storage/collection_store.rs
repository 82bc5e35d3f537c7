//! Per-collection CRUD and filtered scan, built directly on the KV engine
//! and driving the event bus.
//!
//! Grounded on the original implementation's `collection.py`
//! (`Collection.create/retrieve/update/delete/find`, a thin wrapper over a
//! RocksDB column reached by prefix) and on the teacher's
//! `app/database_service.rs` for the overall shape of a service type that
//! owns both the storage handle and the side-effect of notifying
//! subscribers after a successful write.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::bus::{EventBus, EventKind};
use crate::domain::error::{QuipuError, QuipuResult};
use crate::domain::schema::registry::SchemaRegistry;
use crate::storage::kv::{self, KvEngine};

#[derive(Clone)]
pub struct CollectionStore {
    kv: KvEngine,
    registry: SchemaRegistry,
    bus: EventBus,
}

impl CollectionStore {
    pub fn new(kv: KvEngine, registry: SchemaRegistry, bus: EventBus) -> Self {
        Self { kv, registry, bus }
    }

    /// Validates `payload` against the collection's schema, assigns a fresh
    /// record id (any client-supplied `id` is discarded — identity is
    /// assigned by the store, not the caller), persists it, and publishes a
    /// `Create` event.
    pub fn create(&self, collection_id: Uuid, mut payload: JsonValue) -> QuipuResult<JsonValue> {
        let compiled = self.registry.get_compiled(collection_id)?;
        let record_id = Uuid::new_v4();
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("id".to_string(), JsonValue::String(record_id.to_string()));
        }

        let record = compiled
            .validate(&payload)
            .map_err(|errs| QuipuError::Validation(format_validation_errors(&errs)))?;

        let bytes = compiled.serialize(&record);
        self.kv.put(&kv::record_key(&collection_id, &record_id), &bytes)?;

        self.bus
            .publish(collection_id, EventKind::Create, Some(record_id), Some(record.clone()));
        Ok(record)
    }

    pub fn read(&self, collection_id: Uuid, record_id: Uuid) -> QuipuResult<JsonValue> {
        let compiled = self.registry.get_compiled(collection_id)?;
        let bytes = self
            .kv
            .get(&kv::record_key(&collection_id, &record_id))?
            .ok_or_else(|| QuipuError::NotFound(format!("record {record_id} does not exist")))?;
        compiled.deserialize(&bytes)
    }

    /// Merges `patch`'s top-level fields onto the existing record, keeping
    /// every field the patch does not mention, then re-validates the
    /// result as a whole. Publishes `Update` on success.
    pub fn update(&self, collection_id: Uuid, record_id: Uuid, patch: JsonValue) -> QuipuResult<JsonValue> {
        let compiled = self.registry.get_compiled(collection_id)?;
        let existing = self.read(collection_id, record_id)?;

        let mut merged = existing
            .as_object()
            .cloned()
            .ok_or_else(|| QuipuError::Storage("stored record is not a JSON object".into()))?;
        if let Some(patch_obj) = patch.as_object() {
            for (key, value) in patch_obj {
                if key == "id" {
                    continue;
                }
                merged.insert(key.clone(), value.clone());
            }
        }
        merged.insert("id".to_string(), JsonValue::String(record_id.to_string()));

        let record = compiled
            .validate(&JsonValue::Object(merged))
            .map_err(|errs| QuipuError::Validation(format_validation_errors(&errs)))?;

        let bytes = compiled.serialize(&record);
        self.kv.put(&kv::record_key(&collection_id, &record_id), &bytes)?;

        self.bus
            .publish(collection_id, EventKind::Update, Some(record_id), Some(record.clone()));
        Ok(record)
    }

    pub fn delete(&self, collection_id: Uuid, record_id: Uuid) -> QuipuResult<()> {
        let pre_image = self.read(collection_id, record_id)?;
        self.kv.delete(&kv::record_key(&collection_id, &record_id))?;
        self.bus
            .publish(collection_id, EventKind::Delete, Some(record_id), Some(pre_image));
        Ok(())
    }

    /// Scans every record in a collection, keeps those matching every
    /// key/value pair in `filter` (plain equality, no operators), and
    /// applies `offset`/`limit` after filtering. Does not publish an event:
    /// reads are not mutations.
    pub fn find(
        &self,
        collection_id: Uuid,
        filter: &HashMap<String, JsonValue>,
        limit: usize,
        offset: usize,
    ) -> QuipuResult<Vec<JsonValue>> {
        let compiled = self.registry.get_compiled(collection_id)?;
        let rows = self.kv.prefix_scan(&kv::collection_prefix(&collection_id))?;

        let mut out = Vec::new();
        let mut skipped = 0usize;
        for (_, bytes) in rows {
            let record = compiled.deserialize(&bytes)?;
            if !compiled.matches(&record, filter) {
                continue;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }
            out.push(record);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    /// Drops every record belonging to a collection without touching its
    /// schema registration. Used when a collection is emptied rather than
    /// deleted outright.
    pub fn purge(&self, collection_id: Uuid) -> QuipuResult<()> {
        self.kv.drop_prefix(&kv::collection_prefix(&collection_id))
    }
}

fn format_validation_errors(errors: &[crate::domain::schema::ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_store() -> (tempfile::TempDir, CollectionStore, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let kv = KvEngine::open(dir.path()).unwrap();
        let registry = SchemaRegistry::load(kv.clone()).unwrap();
        let bus = EventBus::new();
        let schema = json!({
            "title": "Task",
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "done": {"type": "boolean"}
            },
            "required": ["title", "done"]
        });
        let collection_id = registry.create_collection(schema).unwrap().collection_id;
        (dir, CollectionStore::new(kv, registry, bus), collection_id)
    }

    #[test]
    fn create_then_read_round_trips() {
        let (_dir, store, collection_id) = open_store();
        let created = store
            .create(collection_id, json!({"title": "buy milk", "done": false}))
            .unwrap();
        let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();
        let read_back = store.read(collection_id, id).unwrap();
        assert_eq!(read_back["title"], "buy milk");
        assert_eq!(read_back["done"], false);
    }

    #[test]
    fn delete_then_read_not_found() {
        let (_dir, store, collection_id) = open_store();
        let created = store
            .create(collection_id, json!({"title": "x", "done": false}))
            .unwrap();
        let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();
        store.delete(collection_id, id).unwrap();
        assert!(matches!(store.read(collection_id, id), Err(QuipuError::NotFound(_))));
    }

    #[test]
    fn update_merges_fields_and_keeps_id() {
        let (_dir, store, collection_id) = open_store();
        let created = store
            .create(collection_id, json!({"title": "x", "done": false}))
            .unwrap();
        let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();
        let updated = store.update(collection_id, id, json!({"done": true})).unwrap();
        assert_eq!(updated["title"], "x");
        assert_eq!(updated["done"], true);
        assert_eq!(updated["id"], id.to_string());
    }

    #[test]
    fn find_applies_filter_offset_and_limit() {
        let (_dir, store, collection_id) = open_store();
        for i in 0..5 {
            store
                .create(collection_id, json!({"title": format!("t{i}"), "done": i % 2 == 0}))
                .unwrap();
        }
        let mut filter = HashMap::new();
        filter.insert("done".to_string(), json!(true));
        let matched = store.find(collection_id, &filter, 10, 0).unwrap();
        assert_eq!(matched.len(), 3);

        let page = store.find(collection_id, &HashMap::new(), 2, 1).unwrap();
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn purge_empties_collection_without_deleting_schema() {
        let (_dir, store, collection_id) = open_store();
        store
            .create(collection_id, json!({"title": "x", "done": false}))
            .unwrap();
        store.purge(collection_id).unwrap();
        assert!(store.find(collection_id, &HashMap::new(), 10, 0).unwrap().is_empty());
    }
}
