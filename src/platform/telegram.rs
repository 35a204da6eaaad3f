use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{Chat, Recipient};
use tracing::{debug, info, warn};

use crate::platform::registry::ChatRegistry;
use crate::platform::{ChatClient, ChatId, ChatSummary, IncomingMessage};

/// Telegram rejects messages longer than 4096 characters
const MAX_MESSAGE_LEN: usize = 4000;

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// Numeric ids address any chat, `@name` addresses public channels.
fn recipient(chat_id: &ChatId) -> Result<Recipient> {
    let raw = chat_id.as_str();
    if raw.starts_with('@') && raw.len() > 1 {
        return Ok(Recipient::ChannelUsername(raw.to_string()));
    }
    raw.parse::<i64>()
        .map(|id| Recipient::Id(teloxide::types::ChatId(id)))
        .map_err(|_| anyhow!("'{}' is not a Telegram chat id", raw))
}

/// Chat client backed by the Telegram Bot API
pub struct TelegramClient {
    bot: Bot,
    registry: Arc<ChatRegistry>,
}

impl TelegramClient {
    pub fn new(bot: Bot, registry: Arc<ChatRegistry>) -> Self {
        Self { bot, registry }
    }
}

#[async_trait]
impl ChatClient for TelegramClient {
    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<()> {
        let to = recipient(chat_id)?;
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            self.bot
                .send_message(to.clone(), chunk)
                .await
                .with_context(|| format!("Failed to send message to chat {}", chat_id))?;
        }
        debug!("Delivered {} bytes to chat {}", text.len(), chat_id);
        Ok(())
    }

    async fn list_open_chats(&self) -> Result<Vec<ChatSummary>> {
        Ok(self.registry.list().await)
    }
}

fn chat_name(chat: &Chat) -> String {
    if let Some(title) = chat.title() {
        return title.to_string();
    }
    match (chat.first_name(), chat.last_name()) {
        (Some(first), Some(last)) => format!("{} {}", first, last),
        (Some(first), None) => first.to_string(),
        _ => chat
            .username()
            .map(|u| format!("@{}", u))
            .unwrap_or_else(|| chat.id.to_string()),
    }
}

/// Command name of a `/command@botname args` message, without slash or bot name.
fn command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn command_reply(name: &str, incoming: &IncomingMessage) -> Option<String> {
    match name {
        "chatid" => Some(format!(
            "Chat id of {}: {}\nUse it in webhook URLs, e.g. /message/{}/<secret>/",
            incoming.chat_name, incoming.chat_id, incoming.chat_id
        )),
        "ping" => Some("pong".to_string()),
        "start" | "help" => Some(
            "I relay webhook calls into this chat.\n\n\
             Commands:\n\
             /chatid - Show this chat's id\n\
             /ping - Check that I'm alive"
                .to_string(),
        ),
        _ => None,
    }
}

/// Run the Telegram update listener.
///
/// Records every chat the bot sees and answers the relay's chat commands.
pub async fn run(bot: Bot, registry: Arc<ChatRegistry>) -> Result<()> {
    info!("Starting Telegram listener...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_channel_post().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![registry])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    registry: Arc<ChatRegistry>,
) -> ResponseResult<()> {
    let incoming = IncomingMessage {
        chat_id: msg.chat.id.to_string(),
        chat_name: chat_name(&msg.chat),
        text: msg.text().map(str::to_string),
    };

    registry.record(&incoming).await;

    let Some(name) = incoming.text.as_deref().and_then(command) else {
        return Ok(());
    };

    info!("Command /{} in chat {} ({})", name, incoming.chat_name, incoming.chat_id);

    match command_reply(name, &incoming) {
        Some(reply) => {
            bot.send_message(msg.chat.id, reply).await?;
        }
        None => warn!("Unknown command /{}", name),
    }

    Ok(())
}
