//! Topic-based fan-out of processed-message events.
//!
//! Delivery is best-effort: publishing never blocks, a slow subscriber lags
//! and loses its oldest events, and subscribers that join late get no replay.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::message::Message;

pub const TOPIC_MESSAGES: &str = "messages";
pub const EVENT_MESSAGE_RECEIVED: &str = "message.received";

/// Per-topic buffer used by [`BroadcastNotifier::default`].
pub const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// A named event carrying a full message record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub name: String,
    pub topic: String,
    pub payload: Message,
}

impl Event {
    /// The `message.received` event on the `messages` topic.
    pub fn message_received(message: Message) -> Self {
        Self {
            name: EVENT_MESSAGE_RECEIVED.to_owned(),
            topic: TOPIC_MESSAGES.to_owned(),
            payload: message,
        }
    }
}

pub trait Notifier: Send + Sync + 'static {
    /// Hand `event` to every current subscriber of `topic`.
    ///
    /// Returns how many subscribers it was handed to; zero is not an error.
    fn publish(&self, topic: &str, event: Event) -> usize;

    fn subscribe(&self, topic: &str) -> Subscription;
}

/// Receiving half of a topic subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: broadcast::Receiver<Event>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, rx: broadcast::Receiver<Event>) -> Self {
        Self {
            topic: topic.into(),
            rx,
        }
    }

    /// Wait for the next event. Gaps caused by lagging are skipped.
    ///
    /// Returns `None` once the topic is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "subscriber lagged; events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "subscriber lagged; events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {
        debug!(topic = %self.topic, "unsubscribed");
    }

    /// Adapt into a stream, e.g. for server-sent events.
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + 'static {
        let topic = self.topic;
        BroadcastStream::new(self.rx).filter_map(move |item| match item {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(topic = %topic, skipped, "stream subscriber lagged; events dropped");
                None
            }
        })
    }
}

/// In-process notifier with one `tokio::sync::broadcast` channel per topic.
#[derive(Debug)]
pub struct BroadcastNotifier {
    topics: RwLock<HashMap<String, broadcast::Sender<Event>>>,
    capacity: usize,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    fn prune(&self, topic: &str) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        if topics.get(topic).is_some_and(|tx| tx.receiver_count() == 0) {
            topics.remove(topic);
        }
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, topic: &str, event: Event) -> usize {
        let sender = self
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned();

        let Some(tx) = sender else {
            debug!(topic, event = %event.name, "no subscribers; event dropped");
            return 0;
        };

        match tx.send(event) {
            Ok(delivered) => delivered,
            Err(_) => {
                self.prune(topic);
                0
            }
        }
    }

    fn subscribe(&self, topic: &str) -> Subscription {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let rx = topics
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        Subscription::new(topic, rx)
    }
}
