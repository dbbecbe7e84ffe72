//! Thin JSON client for the Telegram Bot API.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::types::{ApiResponse, BotCommand, InlineKeyboardMarkup, Update};
use crate::config::TelegramConfig;
use crate::models::ChatId;
use crate::{AppError, Result};

/// Head-room on top of the long-poll timeout before the HTTP call gives up.
const REQUEST_SLACK: Duration = Duration::from_secs(15);
/// Flood-limited sends are retried this many times.
const MAX_SEND_ATTEMPTS: u32 = 3;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Bot API client bound to one token.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // `base_url` embeds the token.
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

/// A failed call, with the server's flood-wait hint if it gave one.
struct CallError {
    error: AppError,
    retry_after: Option<Duration>,
}

impl TelegramClient {
    /// Build a client for `config.bot_token`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Telegram` if the HTTP client cannot be built.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_seconds) + REQUEST_SLACK)
            .build()
            .map_err(|err| AppError::Telegram(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base_url: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }

    /// Long-poll for updates after `offset`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Telegram` on transport or API failure.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_seconds: u64) -> Result<Vec<Update>> {
        let mut body = json!({
            "timeout": timeout_seconds,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", &body).await.map_err(|err| err.error)
    }

    /// Send a text message, optionally with an inline keyboard. Flood-limited
    /// sends are retried after the server's hint.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Telegram` on transport or API failure.
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = json!(keyboard);
        }

        let mut attempt = 1;
        loop {
            match self.call::<serde_json::Value>("sendMessage", &body).await {
                Ok(_) => {
                    debug!(chat_id, len = text.len(), "message sent");
                    return Ok(());
                }
                Err(CallError {
                    retry_after: Some(delay),
                    error,
                }) if attempt < MAX_SEND_ATTEMPTS => {
                    let delay = delay.min(MAX_RETRY_DELAY);
                    warn!(chat_id, %error, ?delay, "send rate limited; retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.error),
            }
        }
    }

    /// Show a chat action such as `typing`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Telegram` on transport or API failure.
    pub async fn send_chat_action(&self, chat_id: ChatId, action: &str) -> Result<()> {
        let body = json!({ "chat_id": chat_id, "action": action });
        self.call::<bool>("sendChatAction", &body)
            .await
            .map(drop)
            .map_err(|err| err.error)
    }

    /// Acknowledge a button press, optionally with a toast.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Telegram` on transport or API failure.
    pub async fn answer_callback_query(&self, query_id: &str, text: Option<&str>, show_alert: bool) -> Result<()> {
        let mut body = json!({ "callback_query_id": query_id, "show_alert": show_alert });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        self.call::<bool>("answerCallbackQuery", &body)
            .await
            .map(drop)
            .map_err(|err| err.error)
    }

    /// Replace the text of a message the bot sent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Telegram` on transport or API failure.
    pub async fn edit_message_text(&self, chat_id: ChatId, message_id: i64, text: &str) -> Result<()> {
        let body = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        self.call::<serde_json::Value>("editMessageText", &body)
            .await
            .map(drop)
            .map_err(|err| err.error)
    }

    /// Publish the command menu.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Telegram` on transport or API failure.
    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let body = json!({ "commands": commands });
        self.call::<bool>("setMyCommands", &body)
            .await
            .map(drop)
            .map_err(|err| err.error)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &impl Serialize,
    ) -> std::result::Result<T, CallError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|err| CallError {
                error: AppError::Telegram(format!("{method}: {}", err.without_url())),
                retry_after: None,
            })?;

        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|err| CallError {
            error: AppError::Telegram(format!(
                "{method}: unreadable response ({status}): {}",
                err.without_url()
            )),
            retry_after: None,
        })?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                description,
                error_code,
                parameters,
                ..
            } => Err(CallError {
                error: AppError::Telegram(format!(
                    "{method} failed ({}): {}",
                    error_code.map_or_else(|| status.as_u16().to_string(), |code| code.to_string()),
                    description.unwrap_or_else(|| "no description".into())
                )),
                retry_after: parameters
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs),
            }),
        }
    }
}
