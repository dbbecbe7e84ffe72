//! Subset of the Bot API wire format used by the bot.

use serde::{Deserialize, Serialize};

use crate::bot::Button;

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Payload on success.
    pub result: Option<T>,
    /// Human-readable failure reason.
    pub description: Option<String>,
    /// Error code on failure.
    pub error_code: Option<i64>,
    /// Extra failure details such as a flood-wait hint.
    pub parameters: Option<ResponseParameters>,
}

/// Failure details attached to an unsuccessful response.
#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before retrying after a flood limit.
    pub retry_after: Option<u64>,
}

/// One incoming update.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update identifier.
    pub update_id: i64,
    /// New incoming message.
    pub message: Option<Message>,
    /// Inline keyboard button press.
    pub callback_query: Option<CallbackQuery>,
}

/// A chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Identifier unique within the chat.
    pub message_id: i64,
    /// Chat the message belongs to.
    pub chat: Chat,
    /// Sender; absent for channel posts.
    pub from: Option<User>,
    /// Text body.
    pub text: Option<String>,
}

/// Chat reference.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// Chat identifier; negative for groups.
    pub id: i64,
}

/// Telegram user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// User identifier, matched against the allow-list.
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub first_name: String,
}

/// Inline button press.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    /// Identifier to acknowledge.
    pub id: String,
    /// Who pressed the button.
    pub from: User,
    /// Message carrying the keyboard.
    pub message: Option<Message>,
    /// Button payload.
    pub data: Option<String>,
}

/// Inline keyboard attached to a sent message.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineKeyboardMarkup {
    /// Rows of buttons.
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// One inline keyboard button.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineKeyboardButton {
    /// Label.
    pub text: String,
    /// Payload delivered in the callback query.
    pub callback_data: String,
}

impl InlineKeyboardMarkup {
    /// One button per row.
    #[must_use]
    pub fn from_buttons(buttons: &[Button]) -> Self {
        Self {
            inline_keyboard: buttons
                .iter()
                .map(|button| {
                    vec![InlineKeyboardButton {
                        text: button.label.clone(),
                        callback_data: button.data.clone(),
                    }]
                })
                .collect(),
        }
    }
}

/// Entry of the bot's command menu.
#[derive(Debug, Clone, Serialize)]
pub struct BotCommand {
    /// Command name without the slash.
    pub command: String,
    /// Menu description.
    pub description: String,
}
