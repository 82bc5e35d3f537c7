//! The event envelope published on a collection's topic.
//!
//! Shape is grounded on the original implementation's `PubType`/`EventType`
//! wrappers (`{collection, data, event}`): one action tag plus an optional
//! payload, broadcast to every live subscriber of a collection.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Mirrors the action vocabulary accepted by the mutation/stream endpoint.
/// `Stop` is a control event: it tells subscribers the topic is closing
/// rather than describing a record change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Read,
    Update,
    Delete,
    Query,
    Stop,
}

/// One published occurrence on a collection's topic. `seq` is the
/// per-collection monotonic sequence number assigned at publish time;
/// subscribers observe it strictly increasing as long as they stay caught
/// up (see the bus's lag handling for what happens when they don't).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub collection_id: Uuid,
    #[serde(rename = "event")]
    pub kind: EventKind,
    pub id: Option<Uuid>,
    pub data: Option<JsonValue>,
    pub seq: u64,
}
