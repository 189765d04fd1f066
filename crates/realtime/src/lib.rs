//! Parley Realtime Crate
//!
//! Every chatroom owns one pub/sub channel. Writes to a chatroom are followed by
//! a full snapshot published on that channel; subscribers replace their state with it.

pub mod authorizer;
pub mod broadcaster;
pub mod channel;
pub mod events;

pub use authorizer::{ChannelAuthorization, ChannelAuthorizer, ChannelClaims};
pub use broadcaster::{Broadcaster, EventStream, LocalBroadcaster, RedisBroadcaster};
pub use channel::{channel_name, chatroom_from_channel, CHANNEL_PREFIX};
pub use events::{
    ChannelEvent, ChatroomImage, ChatroomUpdate, Envelope, MessageList, MessageUpdate,
    CHATROOM_UPDATE, MESSAGE_UPDATE,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("invalid channel name: {0}")]
    InvalidChannel(String),
    #[error("token was issued for another channel")]
    ChannelMismatch,
    #[error("channel token rejected: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("broker error: {0}")]
    Broker(#[from] redis::RedisError),
    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
