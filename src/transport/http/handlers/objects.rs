//! The overloaded per-collection mutation/stream endpoint.
//!
//! Grounded on the original implementation's `handlers/collections.py`
//! (`POST /{collection_id}/action` dispatching on `ActionRequest.action`)
//! and `handlers/pubsub.py` (`subscribe`, framed as a long-lived stream of
//! events). The POST side performs one action and returns; the GET side
//! opens a subscription and streams every event published on the
//! collection's topic until the client disconnects or the topic closes.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream;
use uuid::Uuid;

use crate::bus::EventKind;
use crate::domain::error::QuipuError;
use crate::infra::config;
use crate::transport::http::types::{parse_filter, ApiResponse, AppState, MutationRequest, MutationResponse, QuipuAction};

#[utoipa::path(
    post,
    path = "/v1/collections/objects/{collection_id}",
    request_body = MutationRequest,
    responses(
        (status = 200, description = "Action applied", body = MutationResponse),
        (status = 400, description = "Missing id/data for the requested action", body = ApiResponse),
        (status = 404, description = "No such collection or record", body = ApiResponse)
    )
)]
pub async fn mutate_handler(
    State(state): State<AppState>,
    Path(collection_id): Path<Uuid>,
    Json(request): Json<MutationRequest>,
) -> impl IntoResponse {
    if state.shutting_down.load(std::sync::atomic::Ordering::SeqCst) {
        return QuipuError::ShuttingDown.into_response();
    }

    let result = match request.event {
        QuipuAction::Create => match request.data {
            Some(data) => state.store.create(collection_id, data),
            None => Err(QuipuError::Protocol("create requires \"data\"".into())),
        },
        QuipuAction::Read => match request.id {
            Some(id) => state.store.read(collection_id, id),
            None => Err(QuipuError::Protocol("read requires \"id\"".into())),
        },
        QuipuAction::Update => match (request.id, request.data) {
            (Some(id), Some(data)) => state.store.update(collection_id, id, data),
            _ => Err(QuipuError::Protocol("update requires \"id\" and \"data\"".into())),
        },
        QuipuAction::Delete => match request.id {
            Some(id) => state
                .store
                .delete(collection_id, id)
                .map(|()| serde_json::json!({ "id": id, "deleted": true })),
            None => Err(QuipuError::Protocol("delete requires \"id\"".into())),
        },
        QuipuAction::Query => {
            let filter = parse_filter(&request.data);
            let limit = request.limit.unwrap_or(100);
            let offset = request.offset.unwrap_or(0);
            state
                .store
                .find(collection_id, &filter, limit, offset)
                .map(|records| serde_json::json!(records))
        }
        QuipuAction::Stop => {
            state.bus.close_topic(collection_id);
            Ok(serde_json::json!({ "collection_id": collection_id, "stopped": true }))
        }
    };

    match result {
        Ok(data) => (
            StatusCode::OK,
            Json(MutationResponse {
                collection: collection_id,
                data,
                event: request.event,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/collections/objects/{collection_id}",
    responses(
        (status = 200, description = "Newline-delimited JSON stream of this collection's events", body = ApiResponse)
    )
)]
pub async fn stream_handler(State(state): State<AppState>, Path(collection_id): Path<Uuid>) -> impl IntoResponse {
    if state.shutting_down.load(std::sync::atomic::Ordering::SeqCst) {
        return QuipuError::ShuttingDown.into_response();
    }
    // A stream against a collection that doesn't exist is a protocol error,
    // not a silent empty stream.
    if state.registry.get_collection(collection_id).is_err() {
        return QuipuError::NotFound(format!("collection {collection_id} does not exist")).into_response();
    }

    let subscription = state.bus.subscribe(collection_id);
    let interval = tokio::time::interval(config::keepalive_interval());

    let body_stream = stream::unfold(
        (subscription, interval, false),
        |(mut sub, mut interval, done)| async move {
            if done {
                return None;
            }
            tokio::select! {
                event = sub.recv() => match event {
                    Some(event) => {
                        let stop = event.kind == EventKind::Stop;
                        let mut line = serde_json::to_string(&event).unwrap_or_default();
                        line.push('\n');
                        Some((Ok::<_, std::io::Error>(axum::body::Bytes::from(line)), (sub, interval, stop)))
                    }
                    None => None,
                },
                _ = interval.tick() => {
                    Some((Ok(axum::body::Bytes::from_static(b": keep-alive\n")), (sub, interval, done)))
                }
            }
        },
    );

    axum::response::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream))
        .expect("static headers always build a valid response")
        .into_response()
}
