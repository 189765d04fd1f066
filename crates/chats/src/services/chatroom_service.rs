//! Chatroom service: creation, membership, invites and updates.

use std::sync::Arc;

use parley_database::{
    Chatroom, ChatroomRepository, MessageRepository, SqlitePool, User, UserRepository,
};
use parley_realtime::{channel_name, chatroom_from_channel, Broadcaster, ChannelEvent};
use tracing::{debug, info};

use crate::services::publish_snapshot;
use crate::types::{
    ChatError, ChatResult, ChatroomDetails, ChatroomOverview, ChatroomSummary, InviteOutcome,
    UpdateChatroom,
};
use crate::utils::validation::Validator;

#[derive(Clone)]
pub struct ChatroomService {
    chatrooms: ChatroomRepository,
    messages: MessageRepository,
    users: UserRepository,
    broadcaster: Arc<dyn Broadcaster>,
    default_image: String,
}

impl ChatroomService {
    pub fn new(
        pool: SqlitePool,
        broadcaster: Arc<dyn Broadcaster>,
        default_image: impl Into<String>,
    ) -> Self {
        Self {
            chatrooms: ChatroomRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            users: UserRepository::new(pool),
            broadcaster,
            default_image: default_image.into(),
        }
    }

    /// Chatrooms the user belongs to, oldest first.
    pub async fn list(&self, user: &User) -> ChatResult<Vec<Chatroom>> {
        Ok(self.chatrooms.list_for_user(user.id).await?)
    }

    pub async fn latest(&self, user: &User) -> ChatResult<Option<Chatroom>> {
        Ok(self.chatrooms.latest_for_user(user.id).await?)
    }

    pub async fn details(&self, chatroom_id: &str, user: &User) -> ChatResult<ChatroomDetails> {
        let chatroom = self.member_chatroom(chatroom_id, user).await?;
        let users = self.chatrooms.members(chatroom.id).await?;
        Ok(ChatroomDetails {
            id: chatroom.public_id,
            users,
        })
    }

    /// Chatrooms shared with at least one other user, with those users and the latest message.
    pub async fn overview(&self, user: &User) -> ChatResult<Vec<ChatroomOverview>> {
        let mut overview = Vec::new();

        for chatroom in self.chatrooms.list_for_user(user.id).await? {
            let others: Vec<_> = self
                .chatrooms
                .members(chatroom.id)
                .await?
                .into_iter()
                .filter(|member| member.user_id != user.id)
                .collect();
            if others.is_empty() {
                continue;
            }

            let last_message = self
                .messages
                .last_for_chatroom(chatroom.id)
                .await?
                .map(|message| message.content);

            overview.push(ChatroomOverview {
                id: chatroom.public_id,
                image: chatroom.image,
                users: others,
                last_message,
            });
        }

        Ok(overview)
    }

    /// A new chatroom with the caller as its only member.
    pub async fn create(&self, user: &User) -> ChatResult<Chatroom> {
        let chatroom = self
            .chatrooms
            .create_with_owner(user.id, &self.default_image)
            .await?;
        info!(chatroom = %chatroom.public_id, user = %user.public_id, "chatroom created");
        Ok(chatroom)
    }

    /// Open a chatroom with another user unless the two already share one.
    pub async fn invite(&self, user: &User, username: &str) -> ChatResult<InviteOutcome> {
        Validator::username(username)?;

        let Some(invitee) = self.users.find_by_username(username.trim()).await? else {
            return Ok(InviteOutcome::UserNotFound);
        };
        if invitee.id == user.id {
            return Err(ChatError::validation("cannot invite yourself"));
        }

        if let Some(existing) = self.chatrooms.shared_chatroom(user.id, invitee.id).await? {
            debug!(chatroom = %existing.public_id, "users already share a chatroom");
            return Ok(InviteOutcome::AlreadyShared(existing.public_id));
        }

        let chatroom = self
            .chatrooms
            .create_with_members(&[user.id, invitee.id], &self.default_image)
            .await?;

        info!(
            chatroom = %chatroom.public_id,
            from = %user.public_id,
            to = %invitee.public_id,
            "invite opened chatroom"
        );
        Ok(InviteOutcome::Created(chatroom.public_id))
    }

    /// The chatroom the caller shares with `username`, if any.
    pub async fn find_shared(&self, user: &User, username: &str) -> ChatResult<Option<String>> {
        Validator::username(username)?;

        let other = self
            .users
            .find_by_username(username.trim())
            .await?
            .ok_or_else(|| ChatError::user_not_found(username.trim()))?;

        Ok(self
            .chatrooms
            .shared_chatroom(user.id, other.id)
            .await?
            .map(|chatroom| chatroom.public_id))
    }

    pub async fn update(
        &self,
        chatroom_id: &str,
        user: &User,
        request: UpdateChatroom,
    ) -> ChatResult<ChatroomSummary> {
        let chatroom = self.member_chatroom(chatroom_id, user).await?;
        request.validate()?;

        let chatroom = match request.image() {
            Some(image) => self.chatrooms.update_image(chatroom.id, image).await?,
            None => chatroom,
        };

        publish_snapshot(
            self.broadcaster.as_ref(),
            &channel_name(&chatroom.public_id),
            ChannelEvent::chatroom(&user.public_id, &chatroom.public_id, &chatroom.image),
        )
        .await;

        Ok(chatroom.into())
    }

    /// Delete a chatroom with its memberships and messages.
    pub async fn delete(&self, chatroom_id: &str, user: &User) -> ChatResult<()> {
        let chatroom = self.member_chatroom(chatroom_id, user).await?;
        if !self.chatrooms.delete(chatroom.id).await? {
            return Err(ChatError::chatroom_not_found(chatroom_id));
        }
        info!(chatroom = %chatroom.public_id, user = %user.public_id, "chatroom deleted");
        Ok(())
    }

    /// Resolve a private channel to a chatroom the user may listen to.
    pub async fn authorize_channel(&self, user: &User, channel: &str) -> ChatResult<Chatroom> {
        let chatroom_id =
            chatroom_from_channel(channel).map_err(|e| ChatError::validation(e.to_string()))?;

        let chatroom = self
            .chatrooms
            .find_by_public_id(chatroom_id)
            .await?
            .ok_or_else(|| ChatError::access_denied(format!("no chatroom behind {channel}")))?;

        if !self.chatrooms.is_member(chatroom.id, user.id).await? {
            return Err(ChatError::access_denied(format!(
                "{} is not a member of {}",
                user.public_id, chatroom.public_id
            )));
        }

        Ok(chatroom)
    }

    /// Non-members get the same answer as for a missing chatroom.
    async fn member_chatroom(&self, chatroom_id: &str, user: &User) -> ChatResult<Chatroom> {
        member_chatroom(&self.chatrooms, chatroom_id, user).await
    }
}

pub(crate) async fn member_chatroom(
    chatrooms: &ChatroomRepository,
    chatroom_id: &str,
    user: &User,
) -> ChatResult<Chatroom> {
    let chatroom = chatrooms
        .find_by_public_id(chatroom_id)
        .await?
        .ok_or_else(|| ChatError::chatroom_not_found(chatroom_id))?;

    if !chatrooms.is_member(chatroom.id, user.id).await? {
        return Err(ChatError::chatroom_not_found(chatroom_id));
    }
    Ok(chatroom)
}
