//! Database repository implementations

pub mod chatroom_repository;
pub mod message_repository;
pub mod user_repository;

pub use chatroom_repository::ChatroomRepository;
pub use message_repository::MessageRepository;
pub use user_repository::UserRepository;
