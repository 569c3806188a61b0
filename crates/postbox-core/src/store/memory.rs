use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use super::MessageStore;
use crate::error::StoreError;
use crate::message::{validate_new, Message, MessageId};

/// In-process message store.
///
/// Uses a `tokio::sync::RwLock<BTreeMap>` so listings can run concurrently
/// while writers serialize. Keys are ids, so map order is creation order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<BTreeMap<MessageId, Message>>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl MessageStore for MemoryStore {
    async fn create(&self, sender_id: i64, raw_text: &str) -> Result<Message, StoreError> {
        validate_new(sender_id, raw_text)?;
        // Allocate under the write lock so ids and insertion order agree.
        let mut guard = self.inner.write().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let message = Message::pending(id, sender_id, raw_text.to_owned(), Utc::now());
        guard.insert(id, message.clone());
        Ok(message)
    }

    async fn mark_processed(&self, id: MessageId, processed_text: &str) -> Result<Message, StoreError> {
        let mut guard = self.inner.write().await;
        let record = guard.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        record.mark_processed(processed_text.to_owned(), Utc::now())?;
        Ok(record.clone())
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_pending(&self, after: MessageId, limit: usize) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .range(after.saturating_add(1)..)
            .map(|(_, m)| m)
            .filter(|m| !m.is_processed)
            .take(limit)
            .cloned()
            .collect())
    }
}
