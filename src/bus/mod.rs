//! In-process publish/subscribe event bus, one topic per collection.
//!
//! Grounded on the original implementation's `queue.py` (`Exchange`/`Event`:
//! a per-collection `asyncio.Queue` with a `sub`/`pub` pair and a `"stop"`
//! sentinel event that ends a subscriber's loop). That queue was unbounded;
//! here each topic is a `tokio::sync::broadcast` channel, whose bounded ring
//! buffer and `Lagged` notification on overflow already implement the
//! drop-oldest backpressure policy directly, so there's no need to hand-roll
//! an eviction policy on top of a channel of our own.

pub mod event;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::broadcast;
use uuid::Uuid;

pub use event::{Event, EventKind};

use crate::infra::config;

struct Topic {
    tx: broadcast::Sender<Event>,
    next_seq: Mutex<u64>,
}

/// Where a subscription sits in its lifecycle. `Draining` starts the
/// moment a `Stop` event is observed; the handler is expected to finish
/// flushing whatever it already has buffered and then close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Open,
    Draining,
    Closed,
}

pub struct Subscription {
    collection_id: Uuid,
    receiver: broadcast::Receiver<Event>,
    state: SubscriptionState,
}

impl Subscription {
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Awaits the next event. Returns `None` once the topic has been
    /// closed and fully drained. A slow subscriber that falls behind the
    /// channel's capacity silently skips the events it missed (logged as a
    /// warning) rather than blocking the publisher or erroring out.
    pub async fn recv(&mut self) -> Option<Event> {
        if self.state == SubscriptionState::Closed {
            return None;
        }
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if event.kind == EventKind::Stop {
                        self.state = SubscriptionState::Draining;
                    }
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        collection_id = %self.collection_id,
                        skipped,
                        "subscriber lagged, dropped oldest buffered events"
                    );
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.state = SubscriptionState::Closed;
                    return None;
                }
            }
        }
    }

    pub fn mark_closed(&mut self) {
        self.state = SubscriptionState::Closed;
    }
}

/// Holds one broadcast topic per collection, created lazily on first
/// publish or subscribe.
#[derive(Clone)]
pub struct EventBus {
    topics: Arc<RwLock<HashMap<Uuid, Arc<Topic>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn topic_for(&self, collection_id: Uuid) -> Arc<Topic> {
        if let Some(topic) = self.topics.read().expect("bus lock poisoned").get(&collection_id) {
            return topic.clone();
        }
        let mut topics = self.topics.write().expect("bus lock poisoned");
        topics
            .entry(collection_id)
            .or_insert_with(|| {
                let (tx, _rx) = broadcast::channel(config::subscriber_buffer_capacity());
                Arc::new(Topic {
                    tx,
                    next_seq: Mutex::new(0),
                })
            })
            .clone()
    }

    /// Publishes an event to a collection's topic, returning it with its
    /// assigned sequence number. Sequence assignment and the send are done
    /// under the topic's lock so concurrent publishers can never interleave
    /// out of order.
    pub fn publish(
        &self,
        collection_id: Uuid,
        kind: EventKind,
        id: Option<Uuid>,
        data: Option<serde_json::Value>,
    ) -> Event {
        let topic = self.topic_for(collection_id);
        let mut next_seq = topic.next_seq.lock().expect("topic seq lock poisoned");
        let event = Event {
            collection_id,
            kind,
            id,
            data,
            seq: *next_seq,
        };
        *next_seq += 1;
        // No receivers is not an error: publishing happens whether or not
        // anyone is currently subscribed.
        let _ = topic.tx.send(event.clone());
        event
    }

    pub fn subscribe(&self, collection_id: Uuid) -> Subscription {
        let topic = self.topic_for(collection_id);
        Subscription {
            collection_id,
            receiver: topic.tx.subscribe(),
            state: SubscriptionState::Open,
        }
    }

    /// Broadcasts a `Stop` event on a collection's topic, signalling every
    /// live subscriber to drain and close.
    pub fn close_topic(&self, collection_id: Uuid) {
        self.publish(collection_id, EventKind::Stop, None, None);
    }

    /// Used at shutdown: stops every topic that currently exists.
    pub fn close_all_topics(&self) {
        let ids: Vec<Uuid> = self.topics.read().expect("bus lock poisoned").keys().copied().collect();
        for id in ids {
            self.close_topic(id);
        }
    }
}
