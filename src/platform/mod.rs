pub mod registry;
pub mod telegram;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Opaque chat identifier issued by the chat backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// An open chat as shown on the chats page
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSummary {
    pub id: ChatId,
    pub name: String,
    /// When the listener last saw traffic in this chat, if ever
    pub last_seen: Option<DateTime<Utc>>,
}

/// A message received from the chat backend
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform-specific chat/channel ID as string
    pub chat_id: String,
    /// Group title, or the user's name in private chats
    pub chat_name: String,
    /// The message text, if any
    pub text: Option<String>,
}

/// The chat backend the relay sends through.
///
/// Implementations are not expected to handle concurrent calls; the
/// dispatcher serializes access.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Deliver `text` to one chat.
    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<()>;

    /// Chats the backend currently knows about.
    async fn list_open_chats(&self) -> Result<Vec<ChatSummary>>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use anyhow::anyhow;
    use tokio::sync::Mutex;

    /// Chat client that records every send instead of talking to a backend.
    #[derive(Default)]
    pub struct RecordingClient {
        pub sent: Mutex<Vec<(ChatId, String)>>,
        pub chats: Vec<ChatSummary>,
        pub fail: bool,
    }

    impl RecordingClient {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn with_chats(chats: &[(&str, &str)]) -> Self {
            Self {
                chats: chats
                    .iter()
                    .map(|(id, name)| ChatSummary {
                        id: ChatId::from(*id),
                        name: name.to_string(),
                        last_seen: None,
                    })
                    .collect(),
                ..Self::default()
            }
        }

        pub async fn sent(&self) -> Vec<(ChatId, String)> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<()> {
            if self.fail {
                return Err(anyhow!("chat client is not connected"));
            }
            self.sent
                .lock()
                .await
                .push((chat_id.clone(), text.to_string()));
            Ok(())
        }

        async fn list_open_chats(&self) -> Result<Vec<ChatSummary>> {
            if self.fail {
                return Err(anyhow!("chat client is not connected"));
            }
            Ok(self.chats.clone())
        }
    }
}
