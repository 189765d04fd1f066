//! Chatroom entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chatroom {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    pub image: String,
    pub created_at: String,
}

/// A user as seen from inside a chatroom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatroomMember {
    #[serde(skip)]
    pub user_id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    pub username: String,
    pub image: String,
}
