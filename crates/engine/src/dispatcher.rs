//! Notification dispatch pipeline.
//!
//! One `dispatch` call takes a notification kind, a recipient set and an
//! event payload, and:
//! 1. Validates its arguments (bad kind / empty recipients abort before
//!    any send)
//! 2. Persists a `NotificationRecord` with status `Pending`
//! 3. Fans out one delivery attempt per (recipient, channel) pair, all
//!    concurrent, each failure isolated to its own attempt
//! 4. Finalizes the record: `Sent` only if every attempt succeeded

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinSet;
use uuid::Uuid;

use herald_channels::{ChannelSet, SendMeta, resolve_address};
use herald_common::error::StoreError;
use herald_common::store::RecordStore;
use herald_common::types::{
    Channel, DeliveryAttempt, DeliveryStatus, DispatchResult, NotificationKind, NotificationRecord,
    User,
};
use herald_templates::TemplateRegistry;

/// Errors that abort a dispatch call before any send is attempted.
/// Failures during fan-out never surface here — they are folded into the
/// per-attempt results.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown notification kind '{0}'")]
    UnknownKind(String),

    #[error("no recipients given")]
    NoRecipients,

    #[error("channel '{0}' is not allowed for kind '{1}'")]
    UnsupportedChannel(Channel, NotificationKind),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Optional dispatch parameters.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Restrict delivery to a subset of the kind's default channels.
    pub channels: Option<Vec<Channel>>,
}

/// The orchestration core. One instance is constructed at process start and
/// shared by reference; it owns no per-dispatch state, so concurrent
/// dispatch calls proceed fully in parallel.
pub struct NotificationDispatcher {
    store: Arc<dyn RecordStore>,
    templates: TemplateRegistry,
    channels: Arc<ChannelSet>,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn RecordStore>,
        templates: TemplateRegistry,
        channels: Arc<ChannelSet>,
    ) -> Self {
        Self {
            store,
            templates,
            channels,
        }
    }

    /// Dispatch with the kind given as its wire name; unknown names fail
    /// with `UnknownKind`. Used by API callers that receive the kind as a
    /// string.
    pub async fn dispatch_by_name(
        &self,
        kind: &str,
        recipients: &[Uuid],
        payload: serde_json::Value,
        options: DispatchOptions,
    ) -> Result<DispatchResult, DispatchError> {
        let kind = kind
            .parse::<NotificationKind>()
            .map_err(|_| DispatchError::UnknownKind(kind.to_string()))?;
        self.dispatch(kind, recipients, payload, options).await
    }

    /// Deliver one logical notification to a set of recipients across the
    /// kind's resolved channels. Produces exactly one `NotificationRecord`
    /// regardless of recipient/channel count.
    pub async fn dispatch(
        &self,
        kind: NotificationKind,
        recipients: &[Uuid],
        payload: serde_json::Value,
        options: DispatchOptions,
    ) -> Result<DispatchResult, DispatchError> {
        if recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }

        let mut seen = std::collections::HashSet::new();
        let recipients: Vec<Uuid> = recipients
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let channels = self.effective_channels(kind, &options)?;
        let message = self.primary_rendering(kind, &payload);

        let record = NotificationRecord {
            id: Uuid::new_v4(),
            kind,
            title: kind.title().to_string(),
            message,
            recipients: recipients.clone(),
            priority: kind.priority(),
            channels: channels.clone(),
            payload: payload.clone(),
            status: DeliveryStatus::Pending,
            attempts: Vec::new(),
            created_at: Utc::now(),
            sent_at: None,
        };
        self.store.append_notification(&record).await?;

        // Resolve each recipient once; lookup failures become per-attempt
        // errors on every channel for that recipient.
        let mut users: HashMap<Uuid, Result<User, String>> = HashMap::new();
        for &id in &recipients {
            if users.contains_key(&id) {
                continue;
            }
            let resolved = match self.store.user(id).await {
                Ok(Some(user)) => Ok(user),
                Ok(None) => Err(format!("unknown recipient {}", id)),
                Err(e) => Err(format!("recipient lookup failed: {}", e)),
            };
            users.insert(id, resolved);
        }

        let mut join_set = JoinSet::new();
        for &recipient in &recipients {
            let Some(user) = users.get(&recipient) else {
                continue;
            };
            for &channel in &channels {
                let templates = self.templates;
                let senders = Arc::clone(&self.channels);
                let payload = payload.clone();
                let user = user.clone();
                join_set.spawn(async move {
                    let outcome =
                        attempt_delivery(templates, senders, kind, channel, user, payload).await;
                    DeliveryAttempt {
                        channel,
                        recipient,
                        success: outcome.is_ok(),
                        error: outcome.err(),
                        timestamp: Utc::now(),
                    }
                });
            }
        }

        let mut attempts = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(attempt) => {
                    if let Some(error) = &attempt.error {
                        tracing::warn!(
                            notification_id = %record.id,
                            kind = %kind,
                            channel = %attempt.channel,
                            recipient = %attempt.recipient,
                            error = %error,
                            "Delivery attempt failed"
                        );
                    }
                    attempts.push(attempt);
                }
                Err(e) => tracing::error!(error = %e, "Delivery task aborted"),
            }
        }

        let overall_success = attempts.iter().all(|a| a.success);
        let status = if overall_success {
            DeliveryStatus::Sent
        } else {
            DeliveryStatus::Failed
        };
        let sent_at = overall_success.then(Utc::now);

        self.store
            .finalize_notification(record.id, status, sent_at, &attempts)
            .await?;

        tracing::info!(
            notification_id = %record.id,
            kind = %kind,
            recipients = recipients.len(),
            attempts = attempts.len(),
            status = %status,
            "Notification dispatched"
        );

        Ok(DispatchResult {
            notification_id: record.id,
            overall_success,
            attempts,
        })
    }

    /// Effective channel set: the requested subset of the kind's defaults
    /// (or the full defaults), minus channels the kind has no template for.
    fn effective_channels(
        &self,
        kind: NotificationKind,
        options: &DispatchOptions,
    ) -> Result<Vec<Channel>, DispatchError> {
        let defaults = kind.default_channels();

        let requested: Vec<Channel> = match &options.channels {
            Some(subset) => {
                for &channel in subset {
                    if !defaults.contains(&channel) {
                        return Err(DispatchError::UnsupportedChannel(channel, kind));
                    }
                }
                subset.clone()
            }
            None => defaults.to_vec(),
        };

        Ok(requested
            .into_iter()
            .filter(|&channel| {
                let supported = self.templates.has_template(kind, channel);
                if !supported {
                    tracing::warn!(
                        kind = %kind,
                        channel = %channel,
                        "No template for channel; treating as unsupported for this kind"
                    );
                }
                supported
            })
            .collect())
    }

    /// Channel-agnostic primary rendering stored on the record: the first
    /// default channel with a template defined.
    fn primary_rendering(&self, kind: NotificationKind, payload: &serde_json::Value) -> String {
        kind.default_channels()
            .iter()
            .find_map(|&channel| self.templates.render(kind, channel, payload).ok())
            .unwrap_or_else(|| kind.title().to_string())
    }
}

/// One delivery attempt: render the channel template, resolve the address,
/// invoke the sender. Every failure mode collapses to a message carried on
/// the attempt.
async fn attempt_delivery(
    templates: TemplateRegistry,
    senders: Arc<ChannelSet>,
    kind: NotificationKind,
    channel: Channel,
    user: Result<User, String>,
    payload: serde_json::Value,
) -> Result<(), String> {
    let user = user?;
    let message = templates
        .render(kind, channel, &payload)
        .map_err(|e| e.to_string())?;
    let address = resolve_address(&user, channel)
        .ok_or_else(|| format!("no {} address for recipient {}", channel, user.id))?;
    let sender = senders
        .get(channel)
        .ok_or_else(|| format!("no sender registered for channel {}", channel))?;
    let meta = SendMeta {
        subject: Some(kind.title().to_string()),
        markup: kind.markup(),
    };
    sender
        .send(&address, &message, &meta)
        .await
        .map_err(|e| e.to_string())
}
