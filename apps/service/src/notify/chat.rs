use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::json;

use super::notifier::{Message, Notifier, NotifyError};
use crate::config::NotifierConfig;

/// Chat backend posting to an incoming-webhook URL (`server`).
///
/// Each `to` entry is sent as the `channel` of its own post; with no entries
/// a single post goes to the webhook's default channel.
pub struct ChatNotifier {
    client: reqwest::Client,
    url: String,
    channels: Vec<String>,
}

impl ChatNotifier {
    pub fn new(config: &NotifierConfig, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: config.server.clone(), channels: config.to.clone() })
    }

    fn payloads(&self, message: &Message) -> Vec<serde_json::Value> {
        let text = format!("*{}*\n{}", message.subject, message.body);
        if self.channels.is_empty() {
            return vec![json!({ "text": text })];
        }
        self.channels.iter().map(|channel| json!({ "channel": channel, "text": text })).collect()
    }

    async fn post(&self, payload: serde_json::Value) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::ChatStatus(response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for ChatNotifier {
    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        try_join_all(self.payloads(message).into_iter().map(|payload| self.post(payload))).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "chat"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::CheckConfig;
    use crate::monitoring::{CheckKind, CheckOutcome};
    use crate::notify::{EventKind, NotifierKind, Snapshot};

    fn message() -> Message {
        let check = CheckConfig::new("web1", "https://example.com", CheckKind::Web);
        let snapshot = Snapshot::capture(&check, &CheckOutcome::new("web1"));
        Message {
            subject: "web1 problem".to_string(),
            body: "FAILURE".to_string(),
            kind: EventKind::FailStart,
            snapshot: Arc::new(snapshot),
        }
    }

    #[test]
    fn test_payload_per_channel() {
        let mut config = NotifierConfig::new("chat", NotifierKind::Chat);
        config.server = "https://hooks.example.com/T000".to_string();
        config.to = vec!["#ops".to_string(), "#dev".to_string()];
        let notifier = ChatNotifier::new(&config, Duration::from_secs(5)).unwrap();

        let payloads = notifier.payloads(&message());
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0]["channel"], "#ops");
        assert_eq!(payloads[1]["text"], "*web1 problem*\nFAILURE");
    }

    #[test]
    fn test_single_payload_without_channels() {
        let mut config = NotifierConfig::new("chat", NotifierKind::Chat);
        config.server = "https://hooks.example.com/T000".to_string();
        let notifier = ChatNotifier::new(&config, Duration::from_secs(5)).unwrap();

        let payloads = notifier.payloads(&message());
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].get("channel").is_none());
    }
}
