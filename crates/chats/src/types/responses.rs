//! Response payloads produced by the chat services.

use parley_database::{Chatroom, ChatroomMember, Message};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatroomDetails {
    pub id: String,
    pub users: Vec<ChatroomMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatroomSummary {
    pub id: String,
    pub image: String,
}

impl From<Chatroom> for ChatroomSummary {
    fn from(chatroom: Chatroom) -> Self {
        Self {
            id: chatroom.public_id,
            image: chatroom.image,
        }
    }
}

/// Sidebar entry: a chatroom shared with at least one other user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatroomOverview {
    pub id: String,
    pub image: String,
    pub users: Vec<ChatroomMember>,
    pub last_message: Option<String>,
}

/// Messages of a chatroom in creation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageHistory {
    pub id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteOutcome {
    Created(String),
    UserNotFound,
    AlreadyShared(String),
}
