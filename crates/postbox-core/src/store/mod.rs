//! Message storage abstraction.
//!
//! [`MessageStore`] is the only shared mutable resource in the pipeline.
//! [`MemoryStore`] keeps everything in process; the server crate provides a
//! SQLite implementation behind the same trait.
//!
//! Trait methods use `impl Future` in their signatures so no `async-trait`
//! crate is required.

mod memory;

pub use memory::MemoryStore;

use std::future::Future;

use crate::error::StoreError;
use crate::message::{Message, MessageId};

pub trait MessageStore: Send + Sync + 'static {
    /// Validate and persist a new pending message.
    fn create(
        &self,
        sender_id: i64,
        raw_text: &str,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send;

    /// Complete the pending → processed transition for `id`.
    ///
    /// The "already processed" check and the write are atomic: of any number
    /// of concurrent calls for one id, at most one succeeds and the rest
    /// return [`StoreError::AlreadyProcessed`].
    fn mark_processed(
        &self,
        id: MessageId,
        processed_text: &str,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send;

    fn get(&self, id: MessageId) -> impl Future<Output = Result<Option<Message>, StoreError>> + Send;

    /// Up to `limit` most recently created messages, newest first.
    fn list(&self, limit: usize) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Up to `limit` pending messages with an id greater than `after`,
    /// oldest first. Pass `0` for the first page.
    fn list_pending(
        &self,
        after: MessageId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;
}
