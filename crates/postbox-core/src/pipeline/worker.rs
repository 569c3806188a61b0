use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::{PipelineConfig, WorkItem};
use crate::error::StoreError;
use crate::message::MessageId;
use crate::notifier::{Event, Notifier, TOPIC_MESSAGES};
use crate::processor::{ProcessOutcome, Processor};
use crate::store::MessageStore;

pub(super) struct Worker<S, N> {
    pub(super) index: usize,
    pub(super) rx: flume::Receiver<WorkItem>,
    pub(super) store: Arc<S>,
    pub(super) notifier: Arc<N>,
    pub(super) processor: Processor<S>,
    pub(super) config: Arc<PipelineConfig>,
}

impl<S: MessageStore, N: Notifier> Worker<S, N> {
    pub(super) async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let item = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                item = self.rx.recv_async() => match item {
                    Ok(item) => item,
                    Err(_) => break,
                },
            };

            let span = info_span!("process_message", worker = self.index, message_id = item.message_id);
            self.handle(item).instrument(span).await;
        }
        debug!(worker = self.index, "worker stopped");
    }

    async fn handle(&self, item: WorkItem) {
        let mut attempt = 1;
        loop {
            match self.process_once(item.message_id).await {
                Ok(ProcessOutcome::Transitioned(message)) => {
                    let delivered = self
                        .notifier
                        .publish(TOPIC_MESSAGES, Event::message_received(message));
                    info!(attempt, delivered, "message processed");
                    return;
                }
                Ok(ProcessOutcome::AlreadyProcessed(_)) => {
                    debug!("message already processed; skipping notification");
                    return;
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "transient failure; retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e @ StoreError::NotFound { .. }) => {
                    error!(error = %e, "queued message does not exist; dropping");
                    return;
                }
                Err(e) => {
                    error!(attempt, error = %e, "processing failed; message left pending");
                    return;
                }
            }
        }
    }

    async fn process_once(&self, id: MessageId) -> Result<ProcessOutcome, StoreError> {
        let message = self
            .store
            .get(id)
            .await?
            .ok_or(StoreError::NotFound { id })?;
        self.processor.process(&message).await
    }
}
