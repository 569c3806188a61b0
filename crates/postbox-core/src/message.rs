use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::StoreError;

/// Store-assigned message identity. Strictly increasing in creation order.
pub type MessageId = i64;

/// Upper bound on `raw_text`, counted in Unicode scalar values.
pub const MAX_RAW_TEXT_CHARS: usize = 5000;

/// A submitted message and, once processed, its sanitized form.
///
/// `processed_text` and `processed_at` are `Some` exactly when
/// `is_processed` is `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: i64,
    pub raw_text: String,
    pub processed_text: Option<String>,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Processed,
}

impl Message {
    /// A freshly created, pending record.
    pub fn pending(id: MessageId, sender_id: i64, raw_text: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            sender_id,
            raw_text,
            processed_text: None,
            is_processed: false,
            created_at,
            processed_at: None,
        }
    }

    pub fn status(&self) -> MessageStatus {
        if self.is_processed {
            MessageStatus::Processed
        } else {
            MessageStatus::Pending
        }
    }

    /// Apply the one-way pending → processed transition.
    pub fn mark_processed(&mut self, processed_text: String, at: DateTime<Utc>) -> Result<(), StoreError> {
        if self.is_processed {
            return Err(StoreError::AlreadyProcessed { id: self.id });
        }
        self.processed_text = Some(processed_text);
        self.processed_at = Some(at);
        self.is_processed = true;
        Ok(())
    }
}

/// Check the creation inputs shared by every store implementation.
pub fn validate_new(sender_id: i64, raw_text: &str) -> Result<(), StoreError> {
    if sender_id < 1 {
        return Err(StoreError::Validation {
            field: "sender_id",
            reason: format!("must be at least 1 (got {sender_id})"),
        });
    }
    let len = raw_text.chars().count();
    if len == 0 {
        return Err(StoreError::Validation {
            field: "message",
            reason: "must not be empty".into(),
        });
    }
    if len > MAX_RAW_TEXT_CHARS {
        return Err(StoreError::Validation {
            field: "message",
            reason: format!("must be at most {MAX_RAW_TEXT_CHARS} characters (got {len})"),
        });
    }
    Ok(())
}
