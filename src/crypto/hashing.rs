//! Canonical JSON serialization and content hashing for schema identity.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// Domain separation so a schema hash can never collide with some other
// hashed artifact reusing this helper down the line.
const SCHEMA_DOMAIN: &[u8] = b"quipu-schema";

/// Recursively sorts a JSON value's object keys so that structurally
/// identical documents always serialize to the same bytes.
fn sort_json_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_json_value(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_json_value).collect()),
        _ => value.clone(),
    }
}

/// Produces the canonical JSON string for a value: sorted keys, no
/// insignificant whitespace.
pub fn canonical_json(value: &Value) -> String {
    let sorted = sort_json_value(value);
    serde_json::to_string(&sorted).expect("serde_json::Value always serializes")
}

/// `schema_id = hash(canonical_json(schema))`, hex-encoded.
///
/// Two structurally identical schemas always produce the same id, which is
/// what makes collection creation idempotent on schema content.
pub fn schema_hash(schema: &Value) -> String {
    let canonical = canonical_json(schema);
    let mut hasher = Sha256::new();
    hasher.update(SCHEMA_DOMAIN);
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_structure_same_hash_regardless_of_key_order() {
        let a = json!({"title": "Task", "properties": {"b": 1, "a": 2}});
        let b = json!({"properties": {"a": 2, "b": 1}, "title": "Task"});
        assert_eq!(schema_hash(&a), schema_hash(&b));
    }

    #[test]
    fn different_structure_different_hash() {
        let a = json!({"title": "Task"});
        let b = json!({"title": "Other"});
        assert_ne!(schema_hash(&a), schema_hash(&b));
    }
}
