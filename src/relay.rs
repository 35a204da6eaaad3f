use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::RelayError;
use crate::platform::{ChatClient, ChatId, ChatSummary};

/// Sends relay text through the single chat client instance.
///
/// Every call into the client happens under `lock`, so the backend never
/// sees two requests at once.
pub struct Relay {
    client: Arc<dyn ChatClient>,
    default_chat: Option<ChatId>,
    lock: Mutex<()>,
}

impl Relay {
    pub fn new(client: Arc<dyn ChatClient>, default_chat: Option<ChatId>) -> Self {
        Self {
            client,
            default_chat,
            lock: Mutex::new(()),
        }
    }

    fn resolve(&self, chat_id: Option<&str>) -> Result<ChatId, RelayError> {
        match chat_id.filter(|id| !id.is_empty()) {
            Some(id) => Ok(ChatId::from(id)),
            None => self.default_chat.clone().ok_or(RelayError::MissingChat),
        }
    }

    /// Send `text` to `chat_id`, or to the default chat when none is given.
    /// The client is called exactly once; failures are not retried.
    pub async fn dispatch(&self, chat_id: Option<&str>, text: &str) -> Result<ChatId, RelayError> {
        let chat_id = self.resolve(chat_id)?;

        let _guard = self.lock.lock().await;
        self.client
            .send_message(&chat_id, text)
            .await
            .map_err(RelayError::Adapter)?;

        info!("Relayed message to chat {}", chat_id);
        Ok(chat_id)
    }

    pub async fn open_chats(&self) -> Result<Vec<ChatSummary>, RelayError> {
        let _guard = self.lock.lock().await;
        self.client
            .list_open_chats()
            .await
            .map_err(RelayError::Adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::RecordingClient;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::task::JoinSet;

    /// Client that tracks how many calls overlap.
    #[derive(Default)]
    struct SlowClient {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        sent: AtomicUsize,
    }

    impl SlowClient {
        async fn busy(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ChatClient for SlowClient {
        async fn send_message(&self, _chat_id: &ChatId, _text: &str) -> Result<()> {
            self.busy().await;
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn list_open_chats(&self) -> Result<Vec<ChatSummary>> {
            self.busy().await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_dispatch_without_chat_uses_default_once() {
        let client = Arc::new(RecordingClient::default());
        let relay = Relay::new(client.clone(), Some(ChatId::from("-100")));

        let chat = relay.dispatch(None, "hi").await.unwrap();
        assert_eq!(chat.as_str(), "-100");
        assert_eq!(
            client.sent().await,
            vec![(ChatId::from("-100"), "hi".to_string())]
        );
    }

    #[tokio::test]
    async fn test_dispatch_explicit_chat_wins() {
        let client = Arc::new(RecordingClient::default());
        let relay = Relay::new(client.clone(), Some(ChatId::from("-100")));

        relay.dispatch(Some("42"), "hello").await.unwrap();
        relay.dispatch(Some(""), "blank").await.unwrap();
        relay.dispatch(Some(" 42"), "opaque").await.unwrap();

        let sent = client.sent().await;
        assert_eq!(sent[0].0.as_str(), "42");
        assert_eq!(sent[1].0.as_str(), "-100");
        // chat ids are passed through untouched
        assert_eq!(sent[2].0.as_str(), " 42");
    }

    #[tokio::test]
    async fn test_dispatch_without_any_chat() {
        let client = Arc::new(RecordingClient::default());
        let relay = Relay::new(client.clone(), None);

        let err = relay.dispatch(None, "hi").await.unwrap_err();
        assert!(matches!(err, RelayError::MissingChat));
        assert!(client.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_adapter_failure_is_not_retried() {
        let client = Arc::new(RecordingClient::failing());
        let relay = Relay::new(client.clone(), Some(ChatId::from("-100")));

        let err = relay.dispatch(None, "hi").await.unwrap_err();
        assert!(matches!(err, RelayError::Adapter(_)));
        assert!(relay.open_chats().await.is_err());
    }

    #[tokio::test]
    async fn test_open_chats_passthrough() {
        let client = Arc::new(RecordingClient::with_chats(&[("1", "one"), ("2", "two")]));
        let relay = Relay::new(client, None);

        let chats = relay.open_chats().await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[1].name, "two");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_client_calls_never_overlap() {
        let client = Arc::new(SlowClient::default());
        let relay = Arc::new(Relay::new(client.clone(), Some(ChatId::from("-100"))));

        let mut tasks = JoinSet::new();
        for i in 0..8 {
            let relay = relay.clone();
            tasks.spawn(async move {
                if i % 2 == 0 {
                    relay.dispatch(None, "hi").await.map(|_| ())
                } else {
                    relay.open_chats().await.map(|_| ())
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(client.peak.load(Ordering::SeqCst), 1);
        assert_eq!(client.sent.load(Ordering::SeqCst), 4);
    }
}
