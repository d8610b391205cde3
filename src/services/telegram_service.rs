use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Delivery side of the notification channel. Formatting lives in
/// `notify_service`; this only moves one rendered message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct TelegramService {
    client: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramService {
    pub fn new(bot_token: String, chat_id: String, client: Client) -> Self {
        Self {
            client,
            bot_token,
            chat_id,
        }
    }
}

#[async_trait]
impl MessageSender for TelegramService {
    async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("chat_id", self.chat_id.as_str()),
                ("text", text),
                ("parse_mode", "HTML"),
                ("disable_web_page_preview", "true"),
            ])
            .send()
            .await
            .map_err(|e| Error::Notification(format!("send failed: {}", e)))?;

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| Error::Notification(format!("invalid response: {}", e)))?;

        if body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
            Ok(())
        } else {
            let description = body
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("no description");
            Err(Error::Notification(format!(
                "Telegram rejected message: {}",
                description
            )))
        }
    }
}
