//! Shared types for the chat services.

pub mod errors;
pub mod requests;
pub mod responses;

pub use errors::{ChatError, ChatResult};
pub use requests::{MessageChange, PostMessage, UpdateChatroom};
pub use responses::{
    ChatroomDetails, ChatroomOverview, ChatroomSummary, InviteOutcome, MessageHistory,
};
