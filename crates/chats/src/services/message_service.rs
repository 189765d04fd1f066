//! Message service for managing message operations.

use std::sync::Arc;

use parley_database::{
    Chatroom, ChatroomRepository, Message, MessageRepository, NewMessage, SqlitePool, User,
};
use parley_realtime::{channel_name, Broadcaster, ChannelEvent};
use tracing::info;

use crate::services::chatroom_service::member_chatroom;
use crate::services::publish_snapshot;
use crate::types::{ChatError, ChatResult, MessageChange, MessageHistory, PostMessage};

/// Service for managing message operations
#[derive(Clone)]
pub struct MessageService {
    chatrooms: ChatroomRepository,
    messages: MessageRepository,
    broadcaster: Arc<dyn Broadcaster>,
}

impl MessageService {
    pub fn new(pool: SqlitePool, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            chatrooms: ChatroomRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            broadcaster,
        }
    }

    /// Messages of a chatroom, or `None` when it has none yet.
    pub async fn list(&self, chatroom_id: &str, user: &User) -> ChatResult<Option<MessageHistory>> {
        let chatroom = member_chatroom(&self.chatrooms, chatroom_id, user).await?;
        let messages = self.messages.list_for_chatroom(chatroom.id).await?;

        if messages.is_empty() {
            return Ok(None);
        }

        Ok(Some(MessageHistory {
            id: chatroom.public_id,
            messages,
        }))
    }

    pub async fn post(
        &self,
        chatroom_id: &str,
        user: &User,
        request: PostMessage,
    ) -> ChatResult<Message> {
        request.validate()?;
        let chatroom = member_chatroom(&self.chatrooms, chatroom_id, user).await?;

        if request.sender_id != user.public_id {
            return Err(ChatError::SenderMismatch {
                sender_id: request.sender_id,
            });
        }

        let message = self
            .messages
            .create(
                chatroom.id,
                NewMessage {
                    sender_id: request.sender_id,
                    content: request.content,
                    highlight: request.highlight,
                    visible: request.visible,
                },
            )
            .await?;

        info!(chatroom = %chatroom.public_id, message = %message.public_id, "message posted");
        self.publish_messages(&chatroom, &user.public_id).await?;
        Ok(message)
    }

    /// Change the highlight and visibility of a message.
    pub async fn update(
        &self,
        chatroom_id: &str,
        user: &User,
        request: MessageChange,
    ) -> ChatResult<Message> {
        request.validate()?;
        let chatroom = member_chatroom(&self.chatrooms, chatroom_id, user).await?;

        let message = self
            .messages
            .set_flags(
                chatroom.id,
                &request.message_id,
                request.highlight,
                request.visible,
            )
            .await
            .map_err(|error| match error {
                parley_database::DatabaseError::NotFound(_) => {
                    ChatError::message_not_found(&request.message_id)
                }
                other => other.into(),
            })?;

        info!(
            chatroom = %chatroom.public_id,
            message = %message.public_id,
            highlight = message.highlight,
            visible = message.visible,
            "message updated"
        );
        self.publish_messages(&chatroom, &user.public_id).await?;
        Ok(message)
    }

    /// Remove a message. The remaining list is published even when it is empty.
    pub async fn delete(
        &self,
        chatroom_id: &str,
        user: &User,
        request: MessageChange,
    ) -> ChatResult<()> {
        request.validate()?;
        let chatroom = member_chatroom(&self.chatrooms, chatroom_id, user).await?;

        if !self.messages.delete(chatroom.id, &request.message_id).await? {
            return Err(ChatError::message_not_found(&request.message_id));
        }

        info!(chatroom = %chatroom.public_id, message = %request.message_id, "message deleted");
        self.publish_messages(&chatroom, &user.public_id).await
    }

    async fn publish_messages(&self, chatroom: &Chatroom, sender_id: &str) -> ChatResult<()> {
        let messages = self.messages.list_for_chatroom(chatroom.id).await?;
        publish_snapshot(
            self.broadcaster.as_ref(),
            &channel_name(&chatroom.public_id),
            ChannelEvent::messages(sender_id, messages),
        )
        .await;
        Ok(())
    }
}
