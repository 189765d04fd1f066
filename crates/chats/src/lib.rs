//! # Parley Chats Crate
//!
//! Business logic for chatrooms and messages. Every write is followed by a
//! read of the committed state, which is then published on the chatroom's channel.
//!
//! ## Architecture
//!
//! - **Services**: membership checks, writes and fan-out
//! - **Types**: request/response payloads and errors
//! - **Utils**: input validation

pub mod services;
pub mod types;
pub mod utils;

pub use services::{ChatroomService, MessageService};
pub use types::{
    ChatError, ChatResult, ChatroomDetails, ChatroomOverview, ChatroomSummary, InviteOutcome,
    MessageChange, MessageHistory, PostMessage, UpdateChatroom,
};
