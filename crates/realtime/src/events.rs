//! Events published on chatroom channels

use parley_database::Message;
use serde::{Deserialize, Serialize};

use crate::RealtimeResult;

pub const MESSAGE_UPDATE: &str = "message:update";
pub const CHATROOM_UPDATE: &str = "chatroom:update";

/// Full message list of a chatroom after a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageUpdate {
    pub sender_id: String,
    pub messages: MessageList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    pub sender_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatroomUpdate {
    pub sender_id: String,
    pub chatroom: ChatroomImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatroomImage {
    pub id: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    MessageUpdate(MessageUpdate),
    ChatroomUpdate(ChatroomUpdate),
}

impl ChannelEvent {
    pub fn messages(sender_id: impl Into<String>, messages: Vec<Message>) -> Self {
        let sender_id = sender_id.into();
        Self::MessageUpdate(MessageUpdate {
            sender_id: sender_id.clone(),
            messages: MessageList {
                sender_id,
                messages,
            },
        })
    }

    pub fn chatroom(
        sender_id: impl Into<String>,
        chatroom_id: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self::ChatroomUpdate(ChatroomUpdate {
            sender_id: sender_id.into(),
            chatroom: ChatroomImage {
                id: chatroom_id.into(),
                image: image.into(),
            },
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChannelEvent::MessageUpdate(_) => MESSAGE_UPDATE,
            ChannelEvent::ChatroomUpdate(_) => CHATROOM_UPDATE,
        }
    }

    pub fn to_envelope(&self) -> RealtimeResult<Envelope> {
        let data = match self {
            ChannelEvent::MessageUpdate(update) => serde_json::to_value(update)?,
            ChannelEvent::ChatroomUpdate(update) => serde_json::to_value(update)?,
        };

        Ok(Envelope {
            event: self.name().to_string(),
            data,
        })
    }
}

/// What travels over the broker and down to WebSocket clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: serde_json::Value,
}
