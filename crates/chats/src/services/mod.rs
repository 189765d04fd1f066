//! Chat services.

pub mod chatroom_service;
pub mod message_service;

pub use chatroom_service::ChatroomService;
pub use message_service::MessageService;

use parley_realtime::{Broadcaster, ChannelEvent};
use tracing::warn;

/// Publish after a committed write. A failed publish leaves the write in place and is
/// only logged; the next snapshot on the channel supersedes the missed one.
pub(crate) async fn publish_snapshot(broadcaster: &dyn Broadcaster, channel: &str, event: ChannelEvent) {
    if let Err(error) = broadcaster.publish(channel, &event).await {
        warn!(channel, event = event.name(), error = %error, "failed to publish chatroom update");
    }
}
