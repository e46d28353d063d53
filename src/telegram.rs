use crate::config::{ConnectionConfig, TelegramConfig};
use crate::error::{Result, Service};
use crate::nightscout::upstream_error;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use ureq::Agent;

const SEND_MESSAGE_ENDPOINT: &str = "sendMessage";

/// Destination for rendered reports
pub trait MessageSink {
    fn send_message(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Telegram Bot API client (blocking)
pub struct TelegramNotifier {
    agent: Agent,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent, config }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.telegram.clone(), config.request_timeout)
    }
}

impl MessageSink for TelegramNotifier {
    fn send_message(&self, text: &str) -> Result<()> {
        debug!(chat_id = %self.config.chat_id, chars = text.chars().count(), "Sending Telegram message");

        let payload = SendMessage {
            chat_id: &self.config.chat_id,
            text,
        };

        self.agent
            .post(&self.config.send_message_url())
            .send_json(&payload)
            .map_err(|e| upstream_error(Service::Telegram, SEND_MESSAGE_ENDPOINT, e))?;

        info!(chat_id = %self.config.chat_id, "Message delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = SendMessage {
            chat_id: "42",
            text: "Hallo",
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({"chat_id": "42", "text": "Hallo"})
        );
    }
}
