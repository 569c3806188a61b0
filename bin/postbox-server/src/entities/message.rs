use chrono::{DateTime, Utc};
use postbox_core::message::validate_new;
use postbox_core::{Message, MessageId, MessageStore, StoreError};

use super::SqliteStore;

type MessageRow = (i64, i64, String, Option<String>, bool, String, Option<String>);

const SELECT_COLUMNS: &str =
    "SELECT id, sender_id, raw_text, processed_text, is_processed, created_at, processed_at FROM messages";

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::transient(e)
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn parse_ts(id: MessageId, raw: &str, column: &'static str) -> Result<DateTime<Utc>, StoreError> {
    raw.parse().map_err(|e: chrono::ParseError| {
        tracing::error!(message_id = id, raw = %raw, column, error = %e, "corrupt message timestamp");
        StoreError::transient(format!("message {id}: invalid {column} {raw:?}: {e}"))
    })
}

fn from_row(
    (id, sender_id, raw_text, processed_text, is_processed, created_at, processed_at): MessageRow,
) -> Result<Message, StoreError> {
    Ok(Message {
        id,
        sender_id,
        raw_text,
        processed_text,
        is_processed,
        created_at: parse_ts(id, &created_at, "created_at")?,
        processed_at: processed_at
            .as_deref()
            .map(|s| parse_ts(id, s, "processed_at"))
            .transpose()?,
    })
}

impl MessageStore for SqliteStore {
    async fn create(&self, sender_id: i64, raw_text: &str) -> Result<Message, StoreError> {
        validate_new(sender_id, raw_text)?;
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO messages (sender_id, raw_text, is_processed, created_at) \
             VALUES (?1, ?2, 0, ?3)",
        )
        .bind(sender_id)
        .bind(raw_text)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(Message::pending(
            result.last_insert_rowid(),
            sender_id,
            raw_text.to_owned(),
            created_at,
        ))
    }

    async fn mark_processed(&self, id: MessageId, processed_text: &str) -> Result<Message, StoreError> {
        // The `is_processed = 0` guard makes check-and-set a single statement.
        let result = sqlx::query(
            "UPDATE messages SET processed_text = ?1, is_processed = 1, processed_at = ?2 \
             WHERE id = ?3 AND is_processed = 0",
        )
        .bind(processed_text)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        let current = self.get(id).await?;
        match (result.rows_affected(), current) {
            (_, None) => Err(StoreError::NotFound { id }),
            (0, Some(_)) => Err(StoreError::AlreadyProcessed { id }),
            (_, Some(message)) => Ok(message),
        }
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        let row: Option<MessageRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(from_row).transpose()
    }

    async fn list(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"))
                .bind(sql_limit(limit))
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        rows.into_iter().map(from_row).collect()
    }

    async fn list_pending(&self, after: MessageId, limit: usize) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE is_processed = 0 AND id > ?1 ORDER BY id ASC LIMIT ?2"
        ))
        .bind(after)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.into_iter().map(from_row).collect()
    }
}
