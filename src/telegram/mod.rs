//! Telegram Bot API transport: HTTP client, wire types and the long-poll
//! dispatcher.

pub mod client;
pub mod poller;
pub mod types;
