//! The transform-and-finalize stage of the message pipeline.

pub mod sanitize;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StoreError;
use crate::message::Message;
use crate::store::MessageStore;

pub use sanitize::{sanitize, transform};

/// Result of a successful [`Processor::process`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// This call performed the pending → processed transition.
    Transitioned(Message),
    /// Another delivery already processed the message; nothing changed.
    AlreadyProcessed(Message),
}

impl ProcessOutcome {
    pub fn message(&self) -> &Message {
        match self {
            ProcessOutcome::Transitioned(m) | ProcessOutcome::AlreadyProcessed(m) => m,
        }
    }
}

/// Sanitizes a pending message and records the result in the store.
///
/// Tolerates duplicate delivery: processing a message twice yields one state
/// transition and a no-op second call.
pub struct Processor<S> {
    store: Arc<S>,
    clock: fn() -> DateTime<Utc>,
}

impl<S> Clone for Processor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock,
        }
    }
}

impl<S: MessageStore> Processor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Utc::now,
        }
    }

    /// Replace the clock used for the processing stamp.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn process(&self, message: &Message) -> Result<ProcessOutcome, StoreError> {
        let processed_text = transform(&message.raw_text, (self.clock)());

        match self.store.mark_processed(message.id, &processed_text).await {
            Ok(updated) => Ok(ProcessOutcome::Transitioned(updated)),
            Err(StoreError::AlreadyProcessed { id }) => {
                debug!(message_id = id, "duplicate delivery; already processed");
                let current = self
                    .store
                    .get(id)
                    .await?
                    .ok_or(StoreError::NotFound { id })?;
                Ok(ProcessOutcome::AlreadyProcessed(current))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[tokio::test]
    async fn process_marks_message_processed() {
        let store = Arc::new(MemoryStore::new());
        let processor = Processor::new(Arc::clone(&store)).with_clock(fixed_clock);

        let m = store.create(7, "<b>hi</b>").await.unwrap();
        let outcome = processor.process(&m).await.unwrap();

        let ProcessOutcome::Transitioned(updated) = outcome else {
            panic!("expected a transition");
        };
        assert!(updated.is_processed);
        assert_eq!(
            updated.processed_text.as_deref(),
            Some("hi [Processed at: 2025-01-02 03:04:05]")
        );
        assert_eq!(updated.raw_text, "<b>hi</b>");
    }

    #[tokio::test]
    async fn second_process_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        let first = Processor::new(Arc::clone(&store)).with_clock(fixed_clock);
        let later = Processor::new(Arc::clone(&store)).with_clock(Utc::now);

        let m = store.create(1, "x & y").await.unwrap();
        let a = first.process(&m).await.unwrap();
        let b = later.process(&m).await.unwrap();

        assert!(matches!(a, ProcessOutcome::Transitioned(_)));
        let ProcessOutcome::AlreadyProcessed(current) = b else {
            panic!("expected duplicate to be tolerated");
        };
        assert_eq!(current.processed_text, a.message().processed_text);
    }

    #[tokio::test]
    async fn unknown_message_propagates_not_found() {
        let store = Arc::new(MemoryStore::new());
        let processor = Processor::new(Arc::clone(&store));
        let ghost = Message::pending(404, 1, "ghost".into(), Utc::now());
        assert!(matches!(
            processor.process(&ghost).await,
            Err(StoreError::NotFound { id: 404 })
        ));
    }
}
