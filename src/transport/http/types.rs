use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use utoipa::ToSchema;

use crate::bus::EventBus;
use crate::domain::schema::SchemaRegistry;
use crate::storage::{CollectionStore, KvEngine};

#[derive(Clone)]
pub struct AppState {
    pub kv: KvEngine,
    pub registry: SchemaRegistry,
    pub store: CollectionStore,
    pub bus: EventBus,
    pub shutting_down: Arc<std::sync::atomic::AtomicBool>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: JsonValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// A single registered collection, as returned by the admin endpoints:
/// `{id, sha, schema}`. `sha` is the canonical schema hash collections are
/// idempotent on.
#[derive(Serialize, Debug, ToSchema)]
pub struct CollectionResponse {
    pub id: Uuid,
    pub sha: String,
    #[schema(value_type = Object)]
    pub schema: JsonValue,
}

/// The list-endpoint's per-entry shape: `{id, sha}`, omitting the schema
/// body itself.
#[derive(Serialize, Debug, ToSchema)]
pub struct CollectionSummary {
    pub id: Uuid,
    pub sha: String,
}

/// `DELETE /v1/collections/{collection_id}` response: `0` on success.
#[derive(Serialize, Debug, ToSchema)]
pub struct DeleteCollectionResponse {
    pub code: u8,
}

/// The one overloaded verb the mutation/stream endpoint accepts in its
/// request body, mirroring the action vocabulary of the streamed events
/// themselves.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuipuAction {
    Create,
    Read,
    Update,
    Delete,
    Query,
    Stop,
}

/// Body of `POST /v1/collections/objects/{collection_id}`'s successful
/// response: the resulting record (or record list for `query`, or null for
/// `delete`/`stop`) wrapped with the collection it belongs to and the
/// action that produced it.
#[derive(Serialize, Debug, ToSchema)]
pub struct MutationResponse {
    pub collection: Uuid,
    #[schema(value_type = Object)]
    pub data: JsonValue,
    pub event: QuipuAction,
}

/// Body of `POST /v1/collections/objects/{collection_id}`. Which fields are
/// required depends on `event`:
/// - `create`: `data` required, `id` ignored.
/// - `read`/`delete`: `id` required.
/// - `update`: `id` and `data` required.
/// - `query`: `data` optional (used as an equality filter), `limit`/`offset` optional.
/// - `stop`: neither `id` nor `data` is used.
#[derive(Deserialize, Debug, ToSchema)]
pub struct MutationRequest {
    pub event: QuipuAction,
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(format!("invalid JSON body: {err} (expected: {expected})")),
        }),
    )
}

pub fn parse_filter(data: &Option<JsonValue>) -> HashMap<String, JsonValue> {
    data.as_ref()
        .and_then(|v| v.as_object())
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}
