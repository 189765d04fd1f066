//! Domain entities for the database layer

pub mod chatroom;
pub mod message;
pub mod user;

pub use chatroom::{Chatroom, ChatroomMember};
pub use message::{Message, NewMessage};
pub use user::{AuthProvider, User};

use chrono::{SecondsFormat, Utc};
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

/// Generate an opaque identifier suitable for exposing over the API.
pub fn new_public_id() -> String {
    CUID.create_id()
}

/// Current time as RFC 3339 with microseconds, so that lexical order matches time order.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
