//! Request payloads accepted by the chat services.

use serde::{Deserialize, Serialize};

use crate::utils::validation::Validator;
use crate::ChatResult;

/// A new message. `sender_id` must be the public id of the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessage {
    pub sender_id: String,
    pub content: String,
    pub highlight: bool,
    pub visible: bool,
}

impl PostMessage {
    pub fn validate(&self) -> ChatResult<()> {
        Validator::sender_id(&self.sender_id)?;
        Validator::message_content(&self.content)
    }
}

/// Body of message updates and deletions: the full message plus its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageChange {
    pub message_id: String,
    pub sender_id: String,
    pub content: String,
    pub highlight: bool,
    pub visible: bool,
}

impl MessageChange {
    pub fn validate(&self) -> ChatResult<()> {
        Validator::message_id(&self.message_id)?;
        Validator::sender_id(&self.sender_id)?;
        Validator::message_content(&self.content)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateChatroom {
    #[serde(default)]
    pub image: Option<String>,
}

impl UpdateChatroom {
    /// The requested image, trimmed. Blank values keep the current image.
    pub fn image(&self) -> Option<&str> {
        self.image
            .as_deref()
            .map(str::trim)
            .filter(|image| !image.is_empty())
    }

    pub fn validate(&self) -> ChatResult<()> {
        match self.image() {
            Some(image) => Validator::image_url(image),
            None => Ok(()),
        }
    }
}
