pub mod bus;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

pub use bus::EventBus;
pub use domain::error::{QuipuError, QuipuResult};
pub use domain::schema::SchemaRegistry;
pub use storage::{CollectionStore, KvEngine};
