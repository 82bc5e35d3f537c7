pub mod router;
pub mod types;
pub mod handlers {
    pub mod collections;
    pub mod health;
    pub mod objects;
}

pub use router::{create_router, ApiDoc};
pub use types::AppState;
