use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::KnownChat;
use crate::platform::{ChatId, ChatSummary, IncomingMessage};

/// In-memory record of the chats the bot can post to.
///
/// Chat backends like the Telegram Bot API cannot enumerate a bot's chats, so
/// the listener records every chat it sees. Chats from the settings file are
/// always listed first.
pub struct ChatRegistry {
    known: Vec<KnownChat>,
    seen: RwLock<HashMap<String, ChatSummary>>,
}

impl ChatRegistry {
    pub fn new(known: Vec<KnownChat>) -> Self {
        Self {
            known,
            seen: RwLock::new(HashMap::new()),
        }
    }

    pub async fn record(&self, msg: &IncomingMessage) {
        let mut seen = self.seen.write().await;
        if !seen.contains_key(&msg.chat_id) {
            debug!("New chat seen: {} ({})", msg.chat_name, msg.chat_id);
        }
        seen.insert(
            msg.chat_id.clone(),
            ChatSummary {
                id: ChatId::new(msg.chat_id.clone()),
                name: msg.chat_name.clone(),
                last_seen: Some(Utc::now()),
            },
        );
    }

    /// Configured chats in settings order, then seen chats by name.
    pub async fn list(&self) -> Vec<ChatSummary> {
        let seen = self.seen.read().await;

        let mut chats: Vec<ChatSummary> = self
            .known
            .iter()
            .map(|chat| ChatSummary {
                id: ChatId::new(chat.id.clone()),
                name: chat.name.clone(),
                last_seen: seen.get(&chat.id).and_then(|s| s.last_seen),
            })
            .collect();

        let mut others: Vec<ChatSummary> = seen
            .values()
            .filter(|s| !self.known.iter().any(|k| k.id == s.id.as_str()))
            .cloned()
            .collect();
        others.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });

        chats.extend(others);
        chats
    }
}
