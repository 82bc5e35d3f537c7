//! Collection admin surface: register, list, inspect, and delete
//! collections. Grounded on the original implementation's
//! `handlers/collections.py` (`collections_router`'s `create`/`list`/`get`/
//! `delete` routes) and on the teacher's `execute_handler` style of
//! matching a request, calling into a service, and building an
//! `ApiResponse`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::error::QuipuError;
use crate::transport::http::types::{
    ApiResponse, AppState, CollectionResponse, CollectionSummary, DeleteCollectionResponse,
};

fn to_response(meta: crate::domain::schema::CollectionMetadata) -> CollectionResponse {
    CollectionResponse {
        id: meta.collection_id,
        sha: meta.schema_sha,
        schema: meta.schema,
    }
}

fn to_summary(meta: crate::domain::schema::CollectionMetadata) -> CollectionSummary {
    CollectionSummary {
        id: meta.collection_id,
        sha: meta.schema_sha,
    }
}

#[utoipa::path(
    post,
    path = "/v1/collections",
    responses(
        (status = 200, description = "Collection registered (or already existed for this schema)", body = CollectionResponse),
        (status = 400, description = "Invalid schema", body = ApiResponse)
    )
)]
pub async fn create_collection_handler(State(state): State<AppState>, Json(schema): Json<JsonValue>) -> impl IntoResponse {
    match state.registry.create_collection(schema) {
        Ok(meta) => (StatusCode::OK, Json(to_response(meta))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/collections",
    responses((status = 200, description = "All registered collections", body = Vec<CollectionSummary>))
)]
pub async fn list_collections_handler(State(state): State<AppState>) -> impl IntoResponse {
    let collections: Vec<CollectionSummary> = state.registry.list_collections().into_iter().map(to_summary).collect();
    (StatusCode::OK, Json(collections)).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/collections/{collection_id}",
    responses(
        (status = 200, description = "The collection's registration", body = CollectionResponse),
        (status = 404, description = "No such collection", body = ApiResponse)
    )
)]
pub async fn get_collection_handler(State(state): State<AppState>, Path(collection_id): Path<Uuid>) -> impl IntoResponse {
    match state.registry.get_collection(collection_id) {
        Ok(meta) => (StatusCode::OK, Json(to_response(meta))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/collections/{collection_id}",
    responses(
        (status = 200, description = "Collection and all its records were deleted", body = DeleteCollectionResponse),
        (status = 404, description = "No such collection", body = ApiResponse)
    )
)]
pub async fn delete_collection_handler(
    State(state): State<AppState>,
    Path(collection_id): Path<Uuid>,
) -> impl IntoResponse {
    if state.shutting_down.load(std::sync::atomic::Ordering::SeqCst) {
        return QuipuError::ShuttingDown.into_response();
    }
    match state.registry.delete_collection(collection_id) {
        Ok(()) => {
            state.bus.close_topic(collection_id);
            (StatusCode::OK, Json(DeleteCollectionResponse { code: 0 })).into_response()
        }
        Err(e) => e.into_response(),
    }
}
