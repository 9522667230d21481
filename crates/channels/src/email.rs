//! Email sender backed by the Resend HTTP API.

use std::time::Duration;

use async_trait::async_trait;

use herald_common::types::{Channel, Markup};

use crate::{ChannelSender, SendError, SendMeta};

const API_URL: &str = "https://api.resend.com/emails";
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

pub struct EmailSender {
    api_key: Option<String>,
    from: Option<String>,
    client: reqwest::Client,
}

impl EmailSender {
    pub fn new(api_key: Option<String>, from: Option<String>) -> Self {
        Self {
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, address: &str, message: &str, meta: &SendMeta) -> Result<(), SendError> {
        let (api_key, from) = match (self.api_key.as_deref(), self.from.as_deref()) {
            (Some(key), Some(from)) => (key, from),
            _ => return Err(SendError::NotConfigured(Channel::Email)),
        };

        if !address.contains('@') {
            return Err(SendError::InvalidAddress(format!(
                "invalid email address '{}'",
                address
            )));
        }

        let subject = meta.subject.as_deref().unwrap_or("Fleet notification");
        let mut body = serde_json::json!({
            "from": from,
            "to": [address],
            "subject": subject,
        });
        match meta.markup {
            Markup::Html => body["html"] = message.into(),
            _ => body["text"] = message.into(),
        }

        let response = self
            .client
            .post(API_URL)
            .timeout(SEND_TIMEOUT)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Transport(format!("email send failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(SendError::Transport(format!(
                "email provider returned {}: {}",
                status, detail
            )));
        }

        tracing::debug!(to = address, subject, "Email sent");
        Ok(())
    }
}
