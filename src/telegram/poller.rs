//! Long-poll loop and update dispatch.
//!
//! Updates are fetched in order and each one is handled on its own task, so
//! a long agent turn in one chat never delays other chats. Ordering within a
//! chat is enforced by the chat lock, not here.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, info_span, warn, Instrument};

use super::client::TelegramClient;
use super::types::{BotCommand, CallbackQuery, InlineKeyboardMarkup, Message, Update};
use crate::bot::chunk::{split_message, MAX_MESSAGE_LENGTH};
use crate::bot::commands::{parse_input, Input, MENU};
use crate::bot::{render_run_result, Bot, Reply};
use crate::models::ChatId;

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
/// Telegram clears a chat action after about five seconds.
const TYPING_REFRESH: Duration = Duration::from_secs(4);

/// The command menu in wire form.
#[must_use]
pub fn menu_commands() -> Vec<BotCommand> {
    MENU.iter()
        .map(|(command, description)| BotCommand {
            command: (*command).to_owned(),
            description: (*description).to_owned(),
        })
        .collect()
}

/// Poll for updates until `cancel` fires.
pub async fn run(
    bot: Arc<Bot>,
    client: Arc<TelegramClient>,
    poll_timeout_seconds: u64,
    cancel: CancellationToken,
) {
    let mut offset: Option<i64> = None;
    let mut delay = INITIAL_RETRY_DELAY;
    info!("polling for updates");

    loop {
        let polled = tokio::select! {
            () = cancel.cancelled() => break,
            polled = client.get_updates(offset, poll_timeout_seconds) => polled,
        };

        match polled {
            Ok(updates) => {
                delay = INITIAL_RETRY_DELAY;
                for update in updates {
                    offset = Some(update.update_id + 1);
                    let bot = Arc::clone(&bot);
                    let client = Arc::clone(&client);
                    tokio::spawn(async move { dispatch(&bot, &client, update).await });
                }
            }
            Err(err) => {
                warn!(%err, ?delay, "getUpdates failed; backing off");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = sleep(delay) => {}
                }
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
        }
    }
    info!("poller shutting down");
}

async fn dispatch(bot: &Bot, client: &TelegramClient, update: Update) {
    let span = info_span!("update", update_id = update.update_id);
    async {
        if let Some(message) = update.message {
            handle_message(bot, client, message).await;
        } else if let Some(query) = update.callback_query {
            handle_callback(bot, client, query).await;
        } else {
            debug!("ignoring unsupported update");
        }
    }
    .instrument(span)
    .await;
}

async fn handle_message(bot: &Bot, client: &TelegramClient, message: Message) {
    let chat_id = message.chat.id;
    let Some(text) = message.text else {
        return;
    };

    let user_id = message.from.as_ref().map(|user| user.id);
    if let Err(err) = bot.ensure_authorized(user_id) {
        warn!(chat_id, ?user_id, "rejected unauthorized sender");
        send(client, chat_id, err.user_message()).await;
        return;
    }

    match parse_input(&text) {
        Input::Command(command) => {
            debug!(chat_id, ?command, "command received");
            if let Some(reply) = bot.handle_command(chat_id, command).await {
                deliver(client, chat_id, &reply).await;
            }
        }
        Input::Prompt(prompt) => {
            info!(chat_id, prompt_len = prompt.len(), "prompt received");
            let typing = start_typing(client.clone(), chat_id);
            let result = bot.handle_prompt(chat_id, &prompt).await;
            drop(typing);

            for text in render_run_result(&result) {
                send(client, chat_id, &text).await;
            }
        }
    }
}

async fn handle_callback(bot: &Bot, client: &TelegramClient, query: CallbackQuery) {
    if let Err(err) = bot.ensure_authorized(Some(query.from.id)) {
        warn!(user_id = query.from.id, "rejected unauthorized button press");
        if let Err(err) = client
            .answer_callback_query(&query.id, Some(err.user_message()), true)
            .await
        {
            warn!(%err, "failed to answer callback query");
        }
        return;
    }

    let data = query.data.as_deref().unwrap_or_default();
    let Some(reply) = bot.handle_callback(data).await else {
        debug!(data, "ignoring unknown callback");
        if let Err(err) = client.answer_callback_query(&query.id, None, false).await {
            warn!(%err, "failed to answer callback query");
        }
        return;
    };

    if let Err(err) = client
        .answer_callback_query(&query.id, Some(&reply.notice), false)
        .await
    {
        warn!(%err, "failed to answer callback query");
    }

    if let (Some(edit), Some(message)) = (reply.edit, query.message) {
        if let Err(err) = client
            .edit_message_text(message.chat.id, message.message_id, &edit)
            .await
        {
            warn!(%err, "failed to edit message");
        }
    }
}

/// Send a reply, split to the size limit. The keyboard rides on the last chunk.
async fn deliver(client: &TelegramClient, chat_id: ChatId, reply: &Reply) {
    let keyboard = (!reply.keyboard.is_empty())
        .then(|| InlineKeyboardMarkup::from_buttons(&reply.keyboard));
    let chunks = split_message(&reply.text, MAX_MESSAGE_LENGTH);
    let last = chunks.len().saturating_sub(1);

    for (index, chunk) in chunks.iter().enumerate() {
        let markup = if index == last { keyboard.as_ref() } else { None };
        if let Err(err) = client.send_message(chat_id, chunk, markup).await {
            warn!(chat_id, %err, "failed to send reply");
            return;
        }
    }
}

async fn send(client: &TelegramClient, chat_id: ChatId, text: &str) {
    for chunk in split_message(text, MAX_MESSAGE_LENGTH) {
        if let Err(err) = client.send_message(chat_id, &chunk, None).await {
            warn!(chat_id, %err, "failed to send message");
            return;
        }
    }
}

/// Keep the typing indicator alive until the returned guard is dropped.
fn start_typing(client: TelegramClient, chat_id: ChatId) -> DropGuard {
    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        let mut refresh = tokio::time::interval(TYPING_REFRESH);
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = refresh.tick() => {
                    if let Err(err) = client.send_chat_action(chat_id, "typing").await {
                        debug!(chat_id, %err, "typing indicator failed");
                    }
                }
            }
        }
    });
    cancel.drop_guard()
}
