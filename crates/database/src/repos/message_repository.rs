//! Repository for message data access operations.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::entities::{new_public_id, timestamp, Message, NewMessage};
use crate::types::{DatabaseError, DatabaseResult};

const MESSAGE_COLUMNS: &str = "id, public_id, sender_id, content, highlight, visible, created_at";

#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a message. A highlighted message takes the highlight away from every other message
    /// in the same chatroom.
    pub async fn create(&self, chatroom_id: i64, message: NewMessage) -> DatabaseResult<Message> {
        let mut tx = self.pool.begin().await?;

        if message.highlight {
            let cleared = sqlx::query(
                "UPDATE messages SET highlight = 0 WHERE chatroom_id = ? AND highlight = 1",
            )
            .bind(chatroom_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            debug!(chatroom_id, cleared, "cleared previous highlight");
        }

        let public_id = new_public_id();
        let created_at = timestamp();

        let id = sqlx::query(
            "INSERT INTO messages (public_id, chatroom_id, sender_id, content, highlight, visible, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(chatroom_id)
        .bind(&message.sender_id)
        .bind(&message.content)
        .bind(message.highlight)
        .bind(message.visible)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        info!(chatroom_id, message = %public_id, "stored message");

        Ok(Message {
            id,
            public_id,
            sender_id: message.sender_id,
            content: message.content,
            highlight: message.highlight,
            visible: message.visible,
            created_at,
        })
    }

    /// All messages of a chatroom, oldest first.
    pub async fn list_for_chatroom(&self, chatroom_id: i64) -> DatabaseResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chatroom_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(chatroom_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    /// The newest message of a chatroom, if any.
    pub async fn last_for_chatroom(&self, chatroom_id: i64) -> DatabaseResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chatroom_id = ? ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(chatroom_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    pub async fn find_in_chatroom(
        &self,
        chatroom_id: i64,
        public_id: &str,
    ) -> DatabaseResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chatroom_id = ? AND public_id = ?"
        ))
        .bind(chatroom_id)
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    /// Update the highlight and visibility flags of a message.
    pub async fn set_flags(
        &self,
        chatroom_id: i64,
        public_id: &str,
        highlight: bool,
        visible: bool,
    ) -> DatabaseResult<Message> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "UPDATE messages SET highlight = ?, visible = ?
             WHERE chatroom_id = ? AND public_id = ?
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(highlight)
        .bind(visible)
        .bind(chatroom_id)
        .bind(public_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::not_found(format!("message {public_id}")))?;

        if highlight {
            sqlx::query(
                "UPDATE messages SET highlight = 0
                 WHERE chatroom_id = ? AND public_id <> ? AND highlight = 1",
            )
            .bind(chatroom_id)
            .bind(public_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        message_from_row(&row)
    }

    pub async fn delete(&self, chatroom_id: i64, public_id: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE chatroom_id = ? AND public_id = ?")
            .bind(chatroom_id)
            .bind(public_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn message_from_row(row: &SqliteRow) -> DatabaseResult<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        sender_id: row.try_get("sender_id")?,
        content: row.try_get("content")?,
        highlight: row.try_get("highlight")?,
        visible: row.try_get("visible")?,
        created_at: row.try_get("created_at")?,
    })
}
