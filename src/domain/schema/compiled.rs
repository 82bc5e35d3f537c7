//! The Record Model Compiler: turns a JSON Schema document into a runtime
//! "compiled type" value used for validation, (de)serialization and
//! equality-filter matching.
//!
//! This replaces the original Python implementation's runtime class
//! synthesis (`create_class`/`create_model` building a dynamic Pydantic
//! model) with a tagged-variant value, per the engine's design notes: Rust
//! has no equivalent to building a new nominal type at runtime, so
//! validation/codec/match are plain functions driven by this value instead
//! of methods on a generated type.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value as JsonValue};

use crate::crypto::hashing::canonical_json;
use crate::domain::error::QuipuError;

/// The closed set of JSON Schema scalar kinds this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl ScalarKind {
    fn from_schema_type(t: &str) -> Option<Self> {
        match t {
            "string" => Some(ScalarKind::String),
            "number" => Some(ScalarKind::Number),
            "integer" => Some(ScalarKind::Integer),
            "boolean" => Some(ScalarKind::Boolean),
            "null" => Some(ScalarKind::Null),
            _ => None,
        }
    }

    fn matches(self, value: &JsonValue) -> bool {
        match self {
            ScalarKind::String => value.is_string(),
            ScalarKind::Number => value.is_number(),
            ScalarKind::Integer => value.is_i64() || value.is_u64(),
            ScalarKind::Boolean => value.is_boolean(),
            ScalarKind::Null => value.is_null(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Number => "number",
            ScalarKind::Integer => "integer",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Null => "null",
        }
    }
}

/// A single compiled type: scalar, ordered sequence, nested object, or a
/// closed set of literal values (`enum`).
#[derive(Debug, Clone)]
pub enum CompiledType {
    Scalar(ScalarKind),
    Array(Box<CompiledType>),
    Object(ObjectShape),
    Enum(Vec<JsonValue>),
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub ty: CompiledType,
    pub required: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectShape {
    pub fields: Vec<FieldSpec>,
}

impl ObjectShape {
    fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A validation failure against one field. Collected rather than
/// short-circuited so a caller gets the full picture of what's wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// A schema whose nesting exceeds the configured maximum depth.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// The compiled form of a collection's defining schema, plus enough of the
/// original document to answer `project_json_schema`.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    pub root: ObjectShape,
    pub title: String,
    original: JsonValue,
}

impl CompiledSchema {
    /// Compiles a JSON Schema `object` document into a runtime type.
    ///
    /// Fails with `SchemaTooDeep` (surfaced as `QuipuError::Validation`) if
    /// nesting exceeds `max_depth`.
    pub fn compile(schema: &JsonValue, max_depth: usize) -> Result<Self, QuipuError> {
        let obj = schema
            .as_object()
            .ok_or_else(|| QuipuError::Validation("schema must be a JSON object".into()))?;

        let declared_type = obj.get("type").and_then(|v| v.as_str()).unwrap_or("object");
        if declared_type != "object" {
            return Err(QuipuError::Validation(
                "collection schema must have type \"object\"".into(),
            ));
        }

        let title = obj
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Record")
            .to_string();

        let root = compile_object(obj, max_depth, 0)?;

        Ok(Self {
            root,
            title,
            original: schema.clone(),
        })
    }

    /// `schema_id = hash(canonical_json(schema))` input: the canonical form
    /// of the schema as originally submitted (before `id` injection).
    pub fn canonical(&self) -> String {
        canonical_json(&self.original)
    }

    /// Round-trips the defining schema with an `id` field injected as an
    /// optional top-level string, per the compiler contract.
    pub fn project_json_schema(&self) -> JsonValue {
        let mut projected = self.original.clone();
        if let Some(obj) = projected.as_object_mut() {
            let properties = obj
                .entry("properties")
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if let Some(props) = properties.as_object_mut() {
                props
                    .entry("id")
                    .or_insert_with(|| serde_json::json!({"type": "string"}));
            }
        }
        projected
    }

    /// Validates a create/update payload against this schema.
    ///
    /// Unknown top-level fields are rejected (closed schema). Missing
    /// `required` fields fail. Missing optional fields are left absent in
    /// the returned record rather than defaulted to `null`. `id` is always
    /// accepted as an optional top-level string and is not itself part of
    /// `self.root`.
    pub fn validate(&self, payload: &JsonValue) -> Result<JsonValue, Vec<ValidationError>> {
        let obj = match payload.as_object() {
            Some(o) => o,
            None => {
                return Err(vec![ValidationError {
                    field: String::new(),
                    message: "payload must be a JSON object".into(),
                }])
            }
        };

        let mut errors = Vec::new();
        let known: HashSet<&str> = self
            .root
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(std::iter::once("id"))
            .collect();

        for key in obj.keys() {
            if !known.contains(key.as_str()) {
                errors.push(ValidationError {
                    field: key.clone(),
                    message: format!("unknown field \"{key}\" is not part of the schema"),
                });
            }
        }

        let mut out = Map::new();
        if let Some(id) = obj.get("id") {
            out.insert("id".to_string(), id.clone());
        }

        for field in &self.root.fields {
            match obj.get(&field.name) {
                Some(value) => match validate_value(&field.ty, value, &field.name) {
                    Ok(()) => {
                        out.insert(field.name.clone(), value.clone());
                    }
                    Err(mut errs) => errors.append(&mut errs),
                },
                None if field.required => {
                    errors.push(ValidationError {
                        field: field.name.clone(),
                        message: format!("missing required field \"{}\"", field.name),
                    });
                }
                None => {}
            }
        }

        if errors.is_empty() {
            Ok(JsonValue::Object(out))
        } else {
            Err(errors)
        }
    }

    /// Equality filter match on top-level scalar fields (including `id`).
    pub fn matches(&self, record: &JsonValue, filter: &HashMap<String, JsonValue>) -> bool {
        let Some(obj) = record.as_object() else {
            return false;
        };
        filter.iter().all(|(k, v)| obj.get(k) == Some(v))
    }

    /// Canonical bytes for a validated record. Using canonical
    /// (sorted-key) JSON means `serialize` composed with `deserialize`
    /// round-trips byte-for-byte for any two records with the same field
    /// values regardless of insertion order.
    pub fn serialize(&self, record: &JsonValue) -> Vec<u8> {
        canonical_json(record).into_bytes()
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<JsonValue, QuipuError> {
        serde_json::from_slice(bytes)
            .map_err(|e| QuipuError::Storage(format!("corrupt record bytes: {e}")))
    }
}

fn compile_object(
    obj: &Map<String, JsonValue>,
    max_depth: usize,
    depth: usize,
) -> Result<ObjectShape, QuipuError> {
    if depth > max_depth {
        return Err(QuipuError::Validation(format!(
            "SchemaTooDeep: nesting exceeds max depth {max_depth}"
        )));
    }

    let properties = obj
        .get("properties")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let required: HashSet<String> = obj
        .get("required")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let mut fields = Vec::with_capacity(properties.len());
    for (name, prop_schema) in properties {
        if name == "id" {
            // `id` is always injected separately; a schema-declared `id`
            // property is redundant and ignored rather than duplicated.
            continue;
        }
        let ty = compile_type(&prop_schema, max_depth, depth + 1)?;
        fields.push(FieldSpec {
            required: required.contains(&name),
            name,
            ty,
        });
    }

    Ok(ObjectShape { fields })
}

fn compile_type(
    schema: &JsonValue,
    max_depth: usize,
    depth: usize,
) -> Result<CompiledType, QuipuError> {
    if depth > max_depth {
        return Err(QuipuError::Validation(format!(
            "SchemaTooDeep: nesting exceeds max depth {max_depth}"
        )));
    }

    let obj = schema
        .as_object()
        .ok_or_else(|| QuipuError::Validation("property schema must be a JSON object".into()))?;

    if let Some(enum_values) = obj.get("enum").and_then(|v| v.as_array()) {
        return Ok(CompiledType::Enum(enum_values.clone()));
    }

    let declared_type = obj.get("type").and_then(|v| v.as_str()).unwrap_or("string");

    match declared_type {
        "object" => Ok(CompiledType::Object(compile_object(obj, max_depth, depth)?)),
        "array" => {
            let items = obj
                .get("items")
                .ok_or_else(|| QuipuError::Validation("array schema missing \"items\"".into()))?;
            let item_ty = compile_type(items, max_depth, depth + 1)?;
            Ok(CompiledType::Array(Box::new(item_ty)))
        }
        other => ScalarKind::from_schema_type(other)
            .map(CompiledType::Scalar)
            .ok_or_else(|| QuipuError::Validation(format!("unsupported schema type \"{other}\""))),
    }
}

fn validate_value(ty: &CompiledType, value: &JsonValue, field: &str) -> Result<(), Vec<ValidationError>> {
    match ty {
        CompiledType::Scalar(kind) => {
            if kind.matches(value) {
                Ok(())
            } else {
                Err(vec![ValidationError {
                    field: field.to_string(),
                    message: format!("expected {}, got {}", kind.name(), describe(value)),
                }])
            }
        }
        CompiledType::Enum(values) => {
            if values.contains(value) {
                Ok(())
            } else {
                Err(vec![ValidationError {
                    field: field.to_string(),
                    message: format!("{value} is not one of the allowed enum values"),
                }])
            }
        }
        CompiledType::Array(item_ty) => {
            let arr = value.as_array().ok_or_else(|| {
                vec![ValidationError {
                    field: field.to_string(),
                    message: format!("expected array, got {}", describe(value)),
                }]
            })?;
            let mut errors = Vec::new();
            for (i, item) in arr.iter().enumerate() {
                if let Err(mut errs) = validate_value(item_ty, item, &format!("{field}[{i}]")) {
                    errors.append(&mut errs);
                }
            }
            if errors.is_empty() {
                Ok(())
            } else {
                Err(errors)
            }
        }
        CompiledType::Object(shape) => {
            let obj = value.as_object().ok_or_else(|| {
                vec![ValidationError {
                    field: field.to_string(),
                    message: format!("expected object, got {}", describe(value)),
                }]
            })?;

            let mut errors = Vec::new();
            let known: HashSet<&str> = shape.fields.iter().map(|f| f.name.as_str()).collect();
            for key in obj.keys() {
                if !known.contains(key.as_str()) {
                    errors.push(ValidationError {
                        field: format!("{field}.{key}"),
                        message: format!("unknown field \"{key}\""),
                    });
                }
            }
            for f in &shape.fields {
                match obj.get(&f.name) {
                    Some(v) => {
                        if let Err(mut errs) = validate_value(&f.ty, v, &format!("{field}.{}", f.name)) {
                            errors.append(&mut errs);
                        }
                    }
                    None if f.required => errors.push(ValidationError {
                        field: format!("{field}.{}", f.name),
                        message: format!("missing required field \"{}\"", f.name),
                    }),
                    None => {}
                }
            }
            if errors.is_empty() {
                Ok(())
            } else {
                Err(errors)
            }
        }
    }
}

fn describe(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

impl ObjectShape {
    /// Used by the store's update path: which top-level field names this
    /// shape knows about, for rejecting a patch on an unknown field early.
    pub fn field_names(&self) -> HashSet<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_schema() -> JsonValue {
        json!({
            "title": "Task",
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "done": {"type": "boolean"}
            },
            "required": ["title", "done"]
        })
    }

    #[test]
    fn validate_accepts_well_formed_record() {
        let compiled = CompiledSchema::compile(&task_schema(), DEFAULT_MAX_DEPTH).unwrap();
        let record = json!({"title": "buy milk", "done": false});
        assert!(compiled.validate(&record).is_ok());
    }

    #[test]
    fn validate_rejects_unknown_top_level_field() {
        let compiled = CompiledSchema::compile(&task_schema(), DEFAULT_MAX_DEPTH).unwrap();
        let record = json!({"title": "x", "done": false, "extra": 1});
        let errs = compiled.validate(&record).unwrap_err();
        assert!(errs.iter().any(|e| e.field == "extra"));
    }

    #[test]
    fn validate_rejects_missing_required_field() {
        let compiled = CompiledSchema::compile(&task_schema(), DEFAULT_MAX_DEPTH).unwrap();
        let record = json!({"title": "x"});
        let errs = compiled.validate(&record).unwrap_err();
        assert!(errs.iter().any(|e| e.field == "done"));
    }

    #[test]
    fn round_trip_preserves_value() {
        let compiled = CompiledSchema::compile(&task_schema(), DEFAULT_MAX_DEPTH).unwrap();
        let record = compiled
            .validate(&json!({"title": "x", "done": true, "id": "abc"}))
            .unwrap();
        let bytes = compiled.serialize(&record);
        let back = compiled.deserialize(&bytes).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn too_deep_schema_is_rejected() {
        let mut schema = json!({"type": "string"});
        for _ in 0..20 {
            schema = json!({"type": "object", "properties": {"nested": schema}});
        }
        let err = CompiledSchema::compile(&schema, 10).unwrap_err();
        assert!(matches!(err, QuipuError::Validation(ref m) if m.contains("SchemaTooDeep")));
    }

    #[test]
    fn matches_is_equality_only() {
        let compiled = CompiledSchema::compile(&task_schema(), DEFAULT_MAX_DEPTH).unwrap();
        let record = json!({"title": "a", "done": true});
        let mut filter = HashMap::new();
        filter.insert("done".to_string(), json!(true));
        assert!(compiled.matches(&record, &filter));
        filter.insert("done".to_string(), json!(false));
        assert!(!compiled.matches(&record, &filter));
    }
}
