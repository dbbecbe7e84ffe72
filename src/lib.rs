#![forbid(unsafe_code)]

//! `mini-claw`: a Telegram front-end for a local coding-agent CLI.
//!
//! Each chat gets a working directory and a persistent agent session log.
//! Prompts are run one at a time per chat; different chats run concurrently.

pub mod bot;
pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod telegram;
pub mod workspace;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
