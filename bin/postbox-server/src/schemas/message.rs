//! Request / response bodies for the `/messages` API.

use postbox_core::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{field_errors, FieldErrors};

/// Request body for `POST /messages`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateMessageRequest {
    /// Originator of the message; must be at least 1.
    #[validate(
        required(message = "The sender id field is required."),
        range(min = 1, message = "The sender id field must be at least 1.")
    )]
    pub sender_id: Option<i64>,

    /// Message text, 1 to 5000 characters.
    #[validate(
        required(message = "The message field is required."),
        length(min = 1, max = 5000, message = "The message field must be between 1 and 5000 characters.")
    )]
    pub message: Option<String>,
}

impl CreateMessageRequest {
    /// Read the fields out of an arbitrary JSON body and validate them.
    ///
    /// A field holding the wrong JSON type is reported as such rather than
    /// as missing; `null` counts as missing.
    pub fn from_json(body: &Value) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        let present = |name: &str| body.get(name).filter(|v| !v.is_null());

        let sender_id = match present("sender_id") {
            None => None,
            Some(v) if v.is_i64() => v.as_i64(),
            Some(_) => {
                errors.insert("sender_id".into(), vec!["The sender id field must be an integer.".into()]);
                None
            }
        };
        let message = match present("message") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                errors.insert("message".into(), vec!["The message field must be a string.".into()]);
                None
            }
        };

        let req = Self { sender_id, message };
        if let Err(invalid) = req.validate() {
            for (field, messages) in field_errors(&invalid) {
                errors.entry(field).or_insert(messages);
            }
        }
        if errors.is_empty() {
            Ok(req)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListMessagesQuery {
    /// Maximum number of messages to return (1–100, default 100).
    pub limit: Option<usize>,
}

/// A message as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: i64,
    /// Original submitted text.
    pub message: String,
    /// Sanitized text; `null` while pending.
    pub processed_message: Option<String>,
    pub is_processed: bool,
    /// `"pending"` or `"processed"`.
    pub status: String,
    pub created_at: String,
    pub processed_at: Option<String>,
}

impl From<&Message> for MessageResponse {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id,
            message: m.raw_text.clone(),
            processed_message: m.processed_text.clone(),
            is_processed: m.is_processed,
            status: m.status().to_string(),
            created_at: m.created_at.to_rfc3339(),
            processed_at: m.processed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response body for `POST /messages`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateMessageResponse {
    pub success: bool,
    pub message_id: i64,
    pub data: MessageResponse,
}

/// Response body for `GET /messages`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageListResponse {
    pub success: bool,
    pub data: Vec<MessageResponse>,
}

/// Response body for `GET /messages/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageDetailResponse {
    pub success: bool,
    pub data: MessageResponse,
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn request(sender_id: Option<i64>, message: Option<&str>) -> CreateMessageRequest {
        CreateMessageRequest {
            sender_id,
            message: message.map(str::to_owned),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request(Some(1), Some("hi")).validate().is_ok());
        assert!(request(Some(1), Some(&"a".repeat(5000))).validate().is_ok());
    }

    #[test]
    fn invalid_fields_are_reported() {
        let errors = request(Some(0), Some(&"a".repeat(5001))).validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("sender_id"));
        assert!(fields.contains_key("message"));
    }

    #[test]
    fn missing_fields_are_required() {
        let errors = request(None, None).validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 2);
    }

    #[test]
    fn json_body_is_read_into_request() {
        let req = CreateMessageRequest::from_json(&json!({ "sender_id": 7, "message": "hi" })).unwrap();
        assert_eq!(req.sender_id, Some(7));
        assert_eq!(req.message.as_deref(), Some("hi"));
    }

    #[test]
    fn wrong_json_types_are_field_errors() {
        let errors = CreateMessageRequest::from_json(&json!({ "sender_id": "abc", "message": "hi" })).unwrap_err();
        assert_eq!(errors["sender_id"], ["The sender id field must be an integer."]);
        assert!(!errors.contains_key("message"));

        let errors = CreateMessageRequest::from_json(&json!({ "sender_id": 1.5, "message": 123 })).unwrap_err();
        assert_eq!(errors["sender_id"], ["The sender id field must be an integer."]);
        assert_eq!(errors["message"], ["The message field must be a string."]);
    }

    #[test]
    fn null_and_non_object_bodies_are_missing_fields() {
        let errors = CreateMessageRequest::from_json(&json!({ "sender_id": null })).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors["sender_id"], ["The sender id field is required."]);

        let errors = CreateMessageRequest::from_json(&json!([1, 2])).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn response_reflects_status() {
        let mut m = Message::pending(1, 2, "<b>x</b>".into(), Utc::now());
        let pending = MessageResponse::from(&m);
        assert_eq!(pending.status, "pending");
        assert!(pending.processed_message.is_none());

        m.mark_processed("x".into(), Utc::now()).unwrap();
        let done = MessageResponse::from(&m);
        assert_eq!(done.status, "processed");
        assert_eq!(done.message, "<b>x</b>");
        assert_eq!(done.processed_message.as_deref(), Some("x"));
    }
}
