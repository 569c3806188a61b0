//! Message lifecycle core: store, sanitizing processor, fan-out notifier and
//! the queue/worker pipeline that ties them together.

pub mod error;
pub mod message;
pub mod notifier;
pub mod pipeline;
pub mod processor;
pub mod store;


pub use error::{DispatchError, PipelineError, StoreError};
pub use message::{Message, MessageId, MessageStatus, MAX_RAW_TEXT_CHARS};
pub use notifier::{
    BroadcastNotifier, Event, Notifier, Subscription, EVENT_MESSAGE_RECEIVED, TOPIC_MESSAGES,
};
pub use pipeline::{Dispatcher, Pipeline, PipelineConfig, WorkItem};
pub use processor::{ProcessOutcome, Processor};
pub use store::{MemoryStore, MessageStore};
