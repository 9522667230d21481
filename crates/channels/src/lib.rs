//! Channel senders — one adapter per delivery channel.
//!
//! Every sender implements the same capability: deliver an already-rendered
//! message to a channel-specific address. Recipient-to-address resolution
//! lives here too (`resolve_address`), but is invoked by the dispatcher so
//! that a missing address becomes a per-attempt failure rather than a
//! sender concern.

pub mod email;
pub mod sms;
pub mod telegram;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use herald_common::config::HeraldConfig;
use herald_common::error::AppError;
use herald_common::types::{Channel, Markup, User};

pub use email::EmailSender;
pub use sms::SmsSender;
pub use telegram::TelegramSender;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("channel '{0}' is not configured")]
    NotConfigured(Channel),

    #[error("channel is not implemented")]
    NotImplemented,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<SendError> for AppError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::NotConfigured(channel) => {
                AppError::ChannelNotConfigured(format!("channel '{}' is not configured", channel))
            }
            SendError::NotImplemented => {
                AppError::ChannelNotConfigured("channel is not implemented".to_string())
            }
            SendError::InvalidAddress(msg) => AppError::Validation(msg),
            SendError::Transport(msg) => AppError::Internal(msg),
        }
    }
}

/// Delivery metadata accompanying a send.
#[derive(Debug, Clone, Default)]
pub struct SendMeta {
    /// Subject line, used by the email channel.
    pub subject: Option<String>,
    /// Markup hint, used by the chat channel as its parse mode.
    pub markup: Markup,
}

/// Uniform send capability implemented by every delivery channel.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn channel(&self) -> Channel;

    /// Deliver a rendered message to a channel-specific address.
    async fn send(&self, address: &str, message: &str, meta: &SendMeta) -> Result<(), SendError>;
}

/// Resolve a recipient's address for a channel, if they have one.
pub fn resolve_address(user: &User, channel: Channel) -> Option<String> {
    match channel {
        Channel::Telegram => user.chat_id.map(|id| id.to_string()),
        Channel::Email => user.email.clone(),
        Channel::Sms => user.phone.clone(),
    }
}

/// Registry of channel senders shared by the dispatcher and the direct-send
/// API routes.
#[derive(Default)]
pub struct ChannelSet {
    senders: HashMap<Channel, Arc<dyn ChannelSender>>,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the full production sender set from configuration. Senders for
    /// unconfigured transports are still registered — they fail each send
    /// with `NotConfigured`, which the dispatcher records as a failed
    /// attempt instead of crashing.
    pub fn from_config(config: &HeraldConfig) -> Self {
        Self::new()
            .with(Arc::new(TelegramSender::new(
                config.telegram_bot_token.clone(),
            )))
            .with(Arc::new(EmailSender::new(
                config.resend_api_key.clone(),
                config.email_from.clone(),
            )))
            .with(Arc::new(SmsSender::new()))
    }

    pub fn with(mut self, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.insert(sender.channel(), sender);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelSender>> {
        self.senders.get(&channel).cloned()
    }
}
