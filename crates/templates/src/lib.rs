//! Template registry — maps a notification kind to per-channel message
//! templates with `{field}` placeholder interpolation.
//!
//! Rendering is literal substitution against the dispatch payload: fields
//! missing from the payload leave the placeholder token verbatim. There is
//! no recursion, no conditionals and no escaping.

use thiserror::Error;

use herald_common::types::{Channel, NotificationKind};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no template for kind '{kind}' on channel '{channel}'")]
    UnknownTemplate {
        kind: NotificationKind,
        channel: Channel,
    },
}

/// Static registry of message templates, fixed at compile time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRegistry;

impl TemplateRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Whether a template exists for the (kind, channel) pair. The
    /// dispatcher uses this to drop channels a kind does not support
    /// instead of failing the whole dispatch.
    pub fn has_template(&self, kind: NotificationKind, channel: Channel) -> bool {
        Self::template(kind, channel).is_some()
    }

    /// Render the template for (kind, channel) against the payload.
    pub fn render(
        &self,
        kind: NotificationKind,
        channel: Channel,
        payload: &serde_json::Value,
    ) -> Result<String, TemplateError> {
        let template =
            Self::template(kind, channel).ok_or(TemplateError::UnknownTemplate { kind, channel })?;
        Ok(interpolate(template, payload))
    }

    fn template(kind: NotificationKind, channel: Channel) -> Option<&'static str> {
        match (kind, channel) {
            (NotificationKind::TaskOverdue, Channel::Telegram) => {
                Some("⚠️ *Overdue tasks*\n{assignee} has {count} overdue task(s):\n{tasks}")
            }
            (NotificationKind::TaskOverdue, Channel::Email) => Some(
                "<h3>Overdue tasks</h3>\
                 <p>{assignee} has {count} overdue task(s):</p>\
                 <pre>{tasks}</pre>",
            ),
            (NotificationKind::LowStock, Channel::Telegram) => {
                Some("📦 *Low stock* at {machine} ({count} item(s)):\n{items}")
            }
            (NotificationKind::MachineOffline, Channel::Telegram) => Some(
                "🔴 *Machines offline* ({count}):\n{machines}\nNo ping for over {minutes} minutes.",
            ),
            (NotificationKind::MachineOffline, Channel::Email) => Some(
                "<h3>Machines offline</h3>\
                 <p>{count} machine(s) have not pinged for over {minutes} minutes:</p>\
                 <pre>{machines}</pre>",
            ),
            (NotificationKind::RouteCompleted, Channel::Telegram) => {
                Some("✅ Route *{route}* completed by {driver} ({stops} stops).")
            }
            (NotificationKind::MaintenanceDue, Channel::Telegram) => {
                Some("🔧 Maintenance due for *{machine}* — last serviced {last} ({days} days ago).")
            }
            (NotificationKind::IncompleteData, Channel::Telegram) => {
                Some("✏️ Incomplete data for {entity}: missing {fields}.")
            }
            (NotificationKind::SystemAlert, Channel::Telegram) => Some("🚨 *{title}*\n{message}"),
            (NotificationKind::SystemAlert, Channel::Email) => {
                Some("<h3>{title}</h3><p>{message}</p>")
            }
            (NotificationKind::FuelReport, Channel::Telegram) => {
                Some("⛽ Fuel report from {driver}: {liters} L for {vehicle}, odometer {odometer}.")
            }
            (NotificationKind::ArrivalConfirmation, Channel::Telegram) => {
                Some("📍 {driver} arrived at {machine} at {time}.")
            }
            (NotificationKind::ArrivalConfirmation, Channel::Sms) => {
                Some("{driver} arrived at {machine} at {time}")
            }
            (NotificationKind::WarehouseReceipt, Channel::Telegram) => {
                Some("📥 Warehouse receipt: {quantity} {unit} of {item} received at {warehouse}.")
            }
            _ => None,
        }
    }
}

/// Substitute `{field}` placeholders with payload values.
///
/// String values interpolate unquoted; other values use their JSON
/// rendering. Unknown fields and unclosed braces pass through verbatim.
fn interpolate(template: &str, payload: &serde_json::Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match payload.get(name) {
                    Some(serde_json::Value::String(s)) => out.push_str(s),
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                // Unclosed brace: emit the remainder as-is.
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_substitutes_fields() {
        let registry = TemplateRegistry::new();
        let payload = json!({
            "machine": "VM-042 Central Station",
            "count": 2,
            "items": "Espresso beans: 3/10 kg\nCups: 15/50 pcs"
        });
        let out = registry
            .render(NotificationKind::LowStock, Channel::Telegram, &payload)
            .unwrap();
        assert!(out.contains("VM-042 Central Station"));
        assert!(out.contains("2 item(s)"));
        assert!(out.contains("Espresso beans"));
    }

    #[test]
    fn test_missing_field_left_verbatim() {
        let registry = TemplateRegistry::new();
        let payload = json!({ "title": "Audit" });
        let out = registry
            .render(NotificationKind::SystemAlert, Channel::Telegram, &payload)
            .unwrap();
        assert!(out.contains("Audit"));
        assert!(out.contains("{message}"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let registry = TemplateRegistry::new();
        let payload = json!({ "driver": "A. Karimov", "machine": "VM-007", "time": "14:32" });
        let first = registry
            .render(
                NotificationKind::ArrivalConfirmation,
                Channel::Sms,
                &payload,
            )
            .unwrap();
        let second = registry
            .render(
                NotificationKind::ArrivalConfirmation,
                Channel::Sms,
                &payload,
            )
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_template_errors() {
        let registry = TemplateRegistry::new();
        let err = registry
            .render(NotificationKind::LowStock, Channel::Sms, &json!({}))
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnknownTemplate { .. }));
    }

    #[test]
    fn test_every_kind_has_a_telegram_template() {
        let registry = TemplateRegistry::new();
        for kind in NotificationKind::ALL {
            assert!(
                registry.has_template(kind, Channel::Telegram),
                "kind {} lacks a telegram template",
                kind
            );
        }
    }

    #[test]
    fn test_every_default_channel_has_a_template() {
        let registry = TemplateRegistry::new();
        for kind in NotificationKind::ALL {
            for &channel in kind.default_channels() {
                assert!(
                    registry.has_template(kind, channel),
                    "kind {} defaults to {} but has no template for it",
                    kind,
                    channel
                );
            }
        }
    }

    #[test]
    fn test_numeric_values_interpolate() {
        let out = interpolate("{a} + {b}", &json!({ "a": 1, "b": 2.5 }));
        assert_eq!(out, "1 + 2.5");
    }

    #[test]
    fn test_unclosed_brace_passes_through() {
        let out = interpolate("literal {unclosed", &json!({}));
        assert_eq!(out, "literal {unclosed");
    }
}
