//! Error types for the chat system.

use parley_database::DatabaseError;
use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Chatroom not found: {id}")]
    ChatroomNotFound { id: String },

    #[error("Message not found: {id}")]
    MessageNotFound { id: String },

    #[error("User not found: {username}")]
    UserNotFound { username: String },

    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("Sender {sender_id} does not match the signed-in user")]
    SenderMismatch { sender_id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl ChatError {
    pub fn chatroom_not_found(id: impl Into<String>) -> Self {
        Self::ChatroomNotFound { id: id.into() }
    }

    pub fn message_not_found(id: impl Into<String>) -> Self {
        Self::MessageNotFound { id: id.into() }
    }

    pub fn user_not_found(username: impl Into<String>) -> Self {
        Self::UserNotFound {
            username: username.into(),
        }
    }

    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
