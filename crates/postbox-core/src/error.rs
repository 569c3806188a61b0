use thiserror::Error;

use crate::message::MessageId;

/// Boxed source error carried by [`StoreError::Transient`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by a [`MessageStore`](crate::store::MessageStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input failed shape or range checks. Surfaced to the caller, never retried.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The referenced message does not exist.
    #[error("message not found: {id}")]
    NotFound { id: MessageId },

    /// The message already completed its pending → processed transition.
    #[error("message already processed: {id}")]
    AlreadyProcessed { id: MessageId },

    /// The backing storage failed; the operation may succeed if retried.
    #[error("transient store failure: {0}")]
    Transient(#[source] BoxError),
}

impl StoreError {
    pub fn transient(e: impl Into<BoxError>) -> Self {
        StoreError::Transient(e.into())
    }

    /// Whether a worker should retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Errors produced when handing a work item to the pipeline.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Every worker has shut down; the queue no longer accepts items.
    #[error("work queue closed")]
    Closed,
}

/// Errors produced while re-enqueueing pending work.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
