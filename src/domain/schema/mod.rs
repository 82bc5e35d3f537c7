pub mod compiled;
pub mod registry;

pub use compiled::{CompiledSchema, CompiledType, ObjectShape, ScalarKind, ValidationError};
pub use registry::{CollectionMetadata, SchemaRegistry};
