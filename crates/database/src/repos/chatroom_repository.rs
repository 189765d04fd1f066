//! Repository for chatrooms and their memberships.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::entities::{new_public_id, timestamp, Chatroom, ChatroomMember};
use crate::types::{DatabaseError, DatabaseResult};

#[derive(Clone)]
pub struct ChatroomRepository {
    pool: SqlitePool,
}

impl ChatroomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a chatroom owned by a single user.
    pub async fn create_with_owner(&self, owner_id: i64, image: &str) -> DatabaseResult<Chatroom> {
        self.create_with_members(&[owner_id], image).await
    }

    /// Create a chatroom and its memberships in one transaction.
    pub async fn create_with_members(
        &self,
        member_ids: &[i64],
        image: &str,
    ) -> DatabaseResult<Chatroom> {
        let mut tx = self.pool.begin().await?;

        let public_id = new_public_id();
        let now = timestamp();

        let id = sqlx::query("INSERT INTO chatrooms (public_id, image, created_at) VALUES (?, ?, ?)")
            .bind(&public_id)
            .bind(image)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        for user_id in member_ids {
            sqlx::query(
                "INSERT INTO chatroom_members (chatroom_id, user_id, joined_at) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(user_id)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_insert(e, "chatroom member"))?;
        }

        tx.commit().await?;

        info!(chatroom = %public_id, members = member_ids.len(), "created chatroom");

        Ok(Chatroom {
            id,
            public_id,
            image: image.to_string(),
            created_at: now,
        })
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Chatroom>> {
        let row = sqlx::query(
            "SELECT id, public_id, image, created_at FROM chatrooms WHERE public_id = ?",
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(chatroom_from_row).transpose()
    }

    /// Chatrooms the user belongs to, oldest first.
    pub async fn list_for_user(&self, user_id: i64) -> DatabaseResult<Vec<Chatroom>> {
        let rows = sqlx::query(
            "SELECT c.id, c.public_id, c.image, c.created_at
             FROM chatrooms c
             JOIN chatroom_members m ON m.chatroom_id = c.id
             WHERE m.user_id = ?
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(chatroom_from_row).collect()
    }

    /// The most recently created chatroom the user belongs to.
    pub async fn latest_for_user(&self, user_id: i64) -> DatabaseResult<Option<Chatroom>> {
        let row = sqlx::query(
            "SELECT c.id, c.public_id, c.image, c.created_at
             FROM chatrooms c
             JOIN chatroom_members m ON m.chatroom_id = c.id
             WHERE m.user_id = ?
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(chatroom_from_row).transpose()
    }

    pub async fn members(&self, chatroom_id: i64) -> DatabaseResult<Vec<ChatroomMember>> {
        let rows = sqlx::query(
            "SELECT u.id, u.public_id, u.username, u.image
             FROM chatroom_members m
             JOIN users u ON u.id = m.user_id
             WHERE m.chatroom_id = ?
             ORDER BY m.joined_at ASC, m.id ASC",
        )
        .bind(chatroom_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ChatroomMember {
                    user_id: row.try_get("id")?,
                    public_id: row.try_get("public_id")?,
                    username: row.try_get("username")?,
                    image: row.try_get("image")?,
                })
            })
            .collect()
    }

    pub async fn is_member(&self, chatroom_id: i64, user_id: i64) -> DatabaseResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chatroom_members WHERE chatroom_id = ? AND user_id = ?",
        )
        .bind(chatroom_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// The newest chatroom that both users belong to.
    pub async fn shared_chatroom(&self, user_a: i64, user_b: i64) -> DatabaseResult<Option<Chatroom>> {
        let row = sqlx::query(
            "SELECT c.id, c.public_id, c.image, c.created_at
             FROM chatrooms c
             JOIN chatroom_members ma ON ma.chatroom_id = c.id AND ma.user_id = ?
             JOIN chatroom_members mb ON mb.chatroom_id = c.id AND mb.user_id = ?
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT 1",
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(chatroom_from_row).transpose()
    }

    pub async fn update_image(&self, chatroom_id: i64, image: &str) -> DatabaseResult<Chatroom> {
        let row = sqlx::query(
            "UPDATE chatrooms SET image = ? WHERE id = ? RETURNING id, public_id, image, created_at",
        )
        .bind(image)
        .bind(chatroom_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found(format!("chatroom {chatroom_id}")))?;

        chatroom_from_row(&row)
    }

    /// Delete a chatroom together with its memberships and messages.
    pub async fn delete(&self, chatroom_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM chatrooms WHERE id = ?")
            .bind(chatroom_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list(&self) -> DatabaseResult<Vec<Chatroom>> {
        let rows = sqlx::query(
            "SELECT id, public_id, image, created_at FROM chatrooms ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(chatroom_from_row).collect()
    }
}

fn chatroom_from_row(row: &SqliteRow) -> DatabaseResult<Chatroom> {
    Ok(Chatroom {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        image: row.try_get("image")?,
        created_at: row.try_get("created_at")?,
    })
}
