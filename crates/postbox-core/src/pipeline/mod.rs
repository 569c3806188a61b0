//! Queue/worker dispatch for pending messages.
//!
//! Request handlers hand a [`WorkItem`] to the [`Dispatcher`] and return
//! immediately. A pool of worker tasks shares the receiving end of a bounded
//! flume channel; each worker resolves the id, runs the [`Processor`] and
//! publishes the result through the [`Notifier`].
//!
//! # Usage
//!
//! ```rust,ignore
//! let (dispatcher, pipeline) = Pipeline::start(store, notifier, PipelineConfig::default());
//! dispatcher.dispatch(message.id).await?;
//! pipeline.shutdown().await;
//! ```
//!
//! [`Processor`]: crate::processor::Processor
//! [`Notifier`]: crate::notifier::Notifier

mod worker;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{DispatchError, PipelineError};
use crate::message::MessageId;
use crate::notifier::Notifier;
use crate::processor::Processor;
use crate::store::MessageStore;

use worker::Worker;

/// A queued reference to a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    pub message_id: MessageId,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of worker tasks draining the queue.
    pub workers: usize,
    /// Bounded queue capacity; `dispatch` waits while the queue is full.
    pub queue_capacity: usize,
    /// Attempts per item, including the first, for transient store failures.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for every further attempt.
    pub retry_backoff: Duration,
    /// Page size used by [`Pipeline::recover`] when walking pending messages.
    pub recovery_batch: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 1024,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(200),
            recovery_batch: 500,
        }
    }
}

impl PipelineConfig {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(factor)
    }
}

/// Sending half of the work queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: flume::Sender<WorkItem>,
}

impl Dispatcher {
    /// Enqueue `message_id` for processing.
    pub async fn dispatch(&self, message_id: MessageId) -> Result<(), DispatchError> {
        self.tx
            .send_async(WorkItem { message_id })
            .await
            .map_err(|_| DispatchError::Closed)
    }

}

/// Handle to the running worker pool.
#[derive(Debug)]
pub struct Pipeline {
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Spawn the worker pool and return the dispatcher that feeds it.
    pub fn start<S, N>(store: Arc<S>, notifier: Arc<N>, config: PipelineConfig) -> (Dispatcher, Self)
    where
        S: MessageStore,
        N: Notifier,
    {
        let (tx, rx) = flume::bounded::<WorkItem>(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let processor = Processor::new(Arc::clone(&store));
        let config = Arc::new(config);

        let workers = (0..config.workers.max(1))
            .map(|index| {
                let worker = Worker {
                    index,
                    rx: rx.clone(),
                    store: Arc::clone(&store),
                    notifier: Arc::clone(&notifier),
                    processor: processor.clone(),
                    config: Arc::clone(&config),
                };
                tokio::spawn(worker.run(shutdown_rx.clone()))
            })
            .collect::<Vec<_>>();

        info!(workers = workers.len(), queue_capacity = config.queue_capacity, "pipeline started");
        (Dispatcher { tx }, Self { shutdown_tx, workers })
    }

    /// Re-enqueue messages left pending, e.g. by a previous crash.
    ///
    /// Every pending message is dispatched, `batch` at a time in id order.
    /// Returns the number of messages dispatched. Duplicates are harmless:
    /// the store rejects a second transition.
    pub async fn recover<S: MessageStore>(
        store: &S,
        dispatcher: &Dispatcher,
        batch: usize,
    ) -> Result<usize, PipelineError> {
        let batch = batch.max(1);
        let mut after = 0;
        let mut count = 0;
        loop {
            let page = store.list_pending(after, batch).await?;
            for message in &page {
                dispatcher.dispatch(message.id).await?;
            }
            count += page.len();
            match page.last() {
                Some(last) if page.len() == batch => after = last.id,
                _ => break,
            }
        }
        if count > 0 {
            info!(count, "re-enqueued pending messages");
        }
        Ok(count)
    }

    /// Stop all workers and wait for them to exit.
    ///
    /// Items still queued stay pending in the store and are picked up by
    /// [`Pipeline::recover`] on the next start.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
        info!("pipeline stopped");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = PipelineConfig {
            retry_backoff: Duration::from_millis(100),
            ..PipelineConfig::default()
        };
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(4), Duration::from_millis(800));
    }

    #[test]
    fn backoff_saturates() {
        let config = PipelineConfig {
            retry_backoff: Duration::from_secs(u64::MAX / 2),
            ..PipelineConfig::default()
        };
        assert_eq!(config.backoff(40), Duration::MAX);
    }
}
