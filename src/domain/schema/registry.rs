//! Schema Registry: content-addressed collection creation on top of the KV
//! engine.
//!
//! Grounded on the original implementation's `manager.py`/`collection_manager.py`
//! (a singleton that reads each collection's `schema.json` off disk) and on
//! the teacher's `domain/model/registry.rs` (`ModelRegistry`, an in-memory
//! cache warm-started from storage at boot). This registry keeps both ideas:
//! the durable source of truth lives in the KV engine, and an in-memory
//! cache avoids recompiling a schema on every request.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::crypto::hashing::schema_hash;
use crate::domain::error::{QuipuError, QuipuResult};
use crate::domain::schema::compiled::CompiledSchema;
use crate::infra::config;
use crate::storage::kv::{self, KvEngine};

/// The durable, on-disk representation of one registered collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub collection_id: Uuid,
    pub schema: JsonValue,
    pub schema_sha: String,
    pub created_at: DateTime<Utc>,
}

struct CacheEntry {
    metadata: CollectionMetadata,
    compiled: Arc<CompiledSchema>,
}

/// Maps JSON Schema documents to collection ids, keyed by content hash so
/// that registering the same schema twice returns the same `collection_id`
/// instead of creating a duplicate collection.
#[derive(Clone)]
pub struct SchemaRegistry {
    kv: KvEngine,
    cache: Arc<RwLock<HashMap<Uuid, CacheEntry>>>,
}

impl SchemaRegistry {
    /// Builds a registry and warm-starts its in-memory cache from whatever
    /// collections are already durable in `kv`.
    pub fn load(kv: KvEngine) -> QuipuResult<Self> {
        let registry = Self {
            kv,
            cache: Arc::new(RwLock::new(HashMap::new())),
        };
        registry.warm_start()?;
        Ok(registry)
    }

    fn warm_start(&self) -> QuipuResult<()> {
        let rows = self.kv.prefix_scan(&kv::meta_collection_prefix())?;
        let mut cache = self.cache.write().expect("registry cache lock poisoned");
        for (_, value) in rows {
            let metadata: CollectionMetadata = serde_json::from_slice(&value)
                .map_err(|e| QuipuError::Storage(format!("corrupt collection metadata: {e}")))?;
            let compiled = CompiledSchema::compile(&metadata.schema, config::max_schema_depth())?;
            cache.insert(
                metadata.collection_id,
                CacheEntry {
                    metadata,
                    compiled: Arc::new(compiled),
                },
            );
        }
        Ok(())
    }

    /// Registers a schema, returning its `collection_id`. Idempotent: a
    /// schema that is structurally identical to one already registered
    /// (same `canonical_json` content, regardless of key order) returns the
    /// existing collection rather than creating a new one.
    pub fn create_collection(&self, schema: JsonValue) -> QuipuResult<CollectionMetadata> {
        let compiled = CompiledSchema::compile(&schema, config::max_schema_depth())?;
        let sha = schema_hash(&schema);

        if let Some(existing_id) = self.kv.get(&kv::meta_sha_key(&sha))? {
            let id = Uuid::from_slice(&existing_id)
                .map_err(|e| QuipuError::Storage(format!("corrupt collection id: {e}")))?;
            if let Some(entry) = self.cache.read().expect("registry cache lock poisoned").get(&id) {
                return Ok(entry.metadata.clone());
            }
            // Cache miss but the durable index says it exists: storage and
            // cache disagree, which should never happen outside of manual
            // storage surgery.
            return Err(QuipuError::Storage(format!(
                "schema index points at unknown collection {id}"
            )));
        }

        let collection_id = Uuid::new_v4();
        let metadata = CollectionMetadata {
            collection_id,
            schema,
            schema_sha: sha.clone(),
            created_at: Utc::now(),
        };
        let encoded = serde_json::to_vec(&metadata)
            .map_err(|e| QuipuError::Storage(format!("failed to encode collection metadata: {e}")))?;

        self.kv.put(&kv::meta_collection_key(&collection_id), &encoded)?;
        self.kv
            .put(&kv::meta_sha_key(&sha), collection_id.as_bytes())?;

        self.cache.write().expect("registry cache lock poisoned").insert(
            collection_id,
            CacheEntry {
                metadata: metadata.clone(),
                compiled: Arc::new(compiled),
            },
        );

        Ok(metadata)
    }

    pub fn get_collection(&self, collection_id: Uuid) -> QuipuResult<CollectionMetadata> {
        self.cache
            .read()
            .expect("registry cache lock poisoned")
            .get(&collection_id)
            .map(|entry| entry.metadata.clone())
            .ok_or_else(|| QuipuError::NotFound(format!("collection {collection_id} does not exist")))
    }

    pub fn get_compiled(&self, collection_id: Uuid) -> QuipuResult<Arc<CompiledSchema>> {
        self.cache
            .read()
            .expect("registry cache lock poisoned")
            .get(&collection_id)
            .map(|entry| entry.compiled.clone())
            .ok_or_else(|| QuipuError::NotFound(format!("collection {collection_id} does not exist")))
    }

    pub fn list_collections(&self) -> Vec<CollectionMetadata> {
        let mut out: Vec<CollectionMetadata> = self
            .cache
            .read()
            .expect("registry cache lock poisoned")
            .values()
            .map(|entry| entry.metadata.clone())
            .collect();
        out.sort_by_key(|m| m.created_at);
        out
    }

    /// Removes a collection's registry entries and purges every record it
    /// owns. The two storage writes (sha index, collection metadata) and
    /// the data purge are not one RocksDB transaction, but the cache is
    /// only updated after all three succeed, so a crash mid-delete leaves
    /// at worst orphaned data bytes behind rather than a dangling lookup.
    pub fn delete_collection(&self, collection_id: Uuid) -> QuipuResult<()> {
        let metadata = self.get_collection(collection_id)?;

        self.kv.delete(&kv::meta_sha_key(&metadata.schema_sha))?;
        self.kv.delete(&kv::meta_collection_key(&collection_id))?;
        self.kv.drop_prefix(&kv::collection_prefix(&collection_id))?;

        self.cache
            .write()
            .expect("registry cache lock poisoned")
            .remove(&collection_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_registry() -> (tempfile::TempDir, SchemaRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let kv = KvEngine::open(dir.path()).unwrap();
        (dir, SchemaRegistry::load(kv).unwrap())
    }

    fn task_schema() -> JsonValue {
        json!({
            "title": "Task",
            "type": "object",
            "properties": {"title": {"type": "string"}},
            "required": ["title"]
        })
    }

    #[test]
    fn create_collection_is_idempotent_on_schema_content() {
        let (_dir, registry) = open_registry();
        let a = registry.create_collection(task_schema()).unwrap();
        let b = registry.create_collection(task_schema()).unwrap();
        assert_eq!(a.collection_id, b.collection_id);
        assert_eq!(registry.list_collections().len(), 1);
    }

    #[test]
    fn delete_then_get_collection_not_found() {
        let (_dir, registry) = open_registry();
        let created = registry.create_collection(task_schema()).unwrap();
        registry.delete_collection(created.collection_id).unwrap();
        assert!(matches!(
            registry.get_collection(created.collection_id),
            Err(QuipuError::NotFound(_))
        ));
    }

    #[test]
    fn warm_start_recovers_collections_from_storage() {
        let dir = tempfile::tempdir().unwrap();
        let collection_id = {
            let kv = KvEngine::open(dir.path()).unwrap();
            let registry = SchemaRegistry::load(kv).unwrap();
            registry.create_collection(task_schema()).unwrap().collection_id
        };

        let kv = KvEngine::open(dir.path()).unwrap();
        let reopened = SchemaRegistry::load(kv).unwrap();
        assert!(reopened.get_collection(collection_id).is_ok());
    }
}
