use crate::transport::http::handlers::{collections, health, objects};
use crate::transport::http::types::{
    ApiResponse, CollectionResponse, CollectionSummary, DeleteCollectionResponse, MutationRequest, MutationResponse,
    QuipuAction,
};
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        collections::create_collection_handler,
        collections::list_collections_handler,
        collections::get_collection_handler,
        collections::delete_collection_handler,
        objects::mutate_handler,
        objects::stream_handler,
    ),
    components(schemas(
        ApiResponse,
        CollectionResponse,
        CollectionSummary,
        DeleteCollectionResponse,
        MutationRequest,
        MutationResponse,
        QuipuAction,
    ))
)]
#[allow(dead_code)]
pub struct ApiDoc;

pub fn create_router(app_state: crate::transport::http::types::AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route(
            "/v1/collections",
            post(collections::create_collection_handler).get(collections::list_collections_handler),
        )
        .route(
            "/v1/collections/:collection_id",
            get(collections::get_collection_handler).delete(collections::delete_collection_handler),
        )
        .route(
            "/v1/collections/objects/:collection_id",
            post(objects::mutate_handler).get(objects::stream_handler),
        )
        .with_state(app_state)
}
