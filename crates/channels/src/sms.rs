//! SMS sender stub.
//!
//! No SMS provider is wired up; every send fails with `NotImplemented`,
//! which the dispatcher records as a failed attempt. The adapter exists so
//! that adding a real provider is a matter of replacing this one file.

use async_trait::async_trait;

use herald_common::types::Channel;

use crate::{ChannelSender, SendError, SendMeta};

#[derive(Debug, Default)]
pub struct SmsSender;

impl SmsSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelSender for SmsSender {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, address: &str, _message: &str, _meta: &SendMeta) -> Result<(), SendError> {
        tracing::debug!(to = address, "SMS delivery requested but not implemented");
        Err(SendError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sms_always_not_implemented() {
        let sender = SmsSender::new();
        let err = sender
            .send("+998901234567", "hello", &SendMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::NotImplemented));
    }
}
