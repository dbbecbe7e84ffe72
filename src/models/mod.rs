//! Domain model module declarations.

pub mod run;
pub mod session;

/// Opaque chat identifier; negative for Telegram group chats.
pub type ChatId = i64;
