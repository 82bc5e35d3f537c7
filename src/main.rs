use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use quipubase::bus::EventBus;
use quipubase::domain::schema::SchemaRegistry;
use quipubase::infra::config;
use quipubase::storage::{CollectionStore, KvEngine};
use quipubase::transport::http::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let storage_root = config::storage_root();
    tracing::info!(path = %storage_root, "opening storage");
    std::fs::create_dir_all(&storage_root)?;
    let kv = KvEngine::open(&storage_root)?;

    let registry = SchemaRegistry::load(kv.clone())?;
    tracing::info!(collections = registry.list_collections().len(), "warm-started schema registry");

    let bus = EventBus::new();
    let store = CollectionStore::new(kv.clone(), registry.clone(), bus.clone());
    let shutting_down = Arc::new(AtomicBool::new(false));

    let app_state = AppState {
        kv,
        registry,
        store,
        bus: bus.clone(),
        shutting_down: shutting_down.clone(),
    };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);
    let app = http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", http::ApiDoc::openapi()))
        .layer(cors);

    let listen_addr = config::listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(addr = %listen_addr, "listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, draining subscriptions");
            shutting_down.store(true, Ordering::SeqCst);
            bus.close_all_topics();
            tokio::time::sleep(config::shutdown_deadline()).await;
            tracing::info!("graceful shutdown complete");
        }
    }

    Ok(())
}
