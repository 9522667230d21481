//! Telegram chat-message sender via the Bot API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use herald_common::types::{Channel, Markup};

use crate::{ChannelSender, SendError, SendMeta};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramSender {
    bot_token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramSender {
    pub fn new(bot_token: Option<String>) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(token: &str, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", token, method)
    }
}

#[async_trait]
impl ChannelSender for TelegramSender {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn send(&self, address: &str, message: &str, meta: &SendMeta) -> Result<(), SendError> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or(SendError::NotConfigured(Channel::Telegram))?;

        let chat_id: i64 = address
            .parse()
            .map_err(|_| SendError::InvalidAddress(format!("invalid chat id '{}'", address)))?;

        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": message,
        });
        match meta.markup {
            Markup::Markdown => body["parse_mode"] = "Markdown".into(),
            Markup::Html => body["parse_mode"] = "HTML".into(),
            Markup::Plain => {}
        }

        let response = self
            .client
            .post(Self::api_url(token, "sendMessage"))
            .timeout(SEND_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Transport(format!("sendMessage failed: {}", e)))?;

        let result: ApiResponse = response
            .json()
            .await
            .map_err(|e| SendError::Transport(format!("invalid Telegram response: {}", e)))?;

        if !result.ok {
            return Err(SendError::Transport(format!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            )));
        }

        tracing::debug!(chat_id, "Telegram message sent");
        Ok(())
    }
}
