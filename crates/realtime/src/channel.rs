//! Channel naming

use crate::{RealtimeError, RealtimeResult};

pub const CHANNEL_PREFIX: &str = "private-";

/// The channel that carries updates for a chatroom.
pub fn channel_name(chatroom_id: &str) -> String {
    format!("{CHANNEL_PREFIX}{chatroom_id}")
}

/// Recover the chatroom id from a channel name.
pub fn chatroom_from_channel(channel: &str) -> RealtimeResult<&str> {
    match channel.strip_prefix(CHANNEL_PREFIX) {
        Some(id) if !id.is_empty() && !id.chars().any(char::is_whitespace) => Ok(id),
        _ => Err(RealtimeError::InvalidChannel(channel.to_string())),
    }
}
