//! Message entity definitions

use serde::{Deserialize, Serialize};

/// A chat message as stored and as published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "displayId")]
    pub public_id: String,
    pub sender_id: String,
    pub content: String,
    pub highlight: bool,
    pub visible: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: String,
    pub content: String,
    pub highlight: bool,
    pub visible: bool,
}
