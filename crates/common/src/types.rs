use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of notification categories.
///
/// Each kind carries a fixed priority, a fixed default channel set and a
/// chat markup hint, all defined at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskOverdue,
    LowStock,
    MachineOffline,
    RouteCompleted,
    MaintenanceDue,
    IncompleteData,
    SystemAlert,
    FuelReport,
    ArrivalConfirmation,
    WarehouseReceipt,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 10] = [
        NotificationKind::TaskOverdue,
        NotificationKind::LowStock,
        NotificationKind::MachineOffline,
        NotificationKind::RouteCompleted,
        NotificationKind::MaintenanceDue,
        NotificationKind::IncompleteData,
        NotificationKind::SystemAlert,
        NotificationKind::FuelReport,
        NotificationKind::ArrivalConfirmation,
        NotificationKind::WarehouseReceipt,
    ];

    /// Fixed priority of this kind.
    pub fn priority(self) -> Priority {
        match self {
            NotificationKind::TaskOverdue => Priority::High,
            NotificationKind::LowStock => Priority::Medium,
            NotificationKind::MachineOffline => Priority::High,
            NotificationKind::RouteCompleted => Priority::Low,
            NotificationKind::MaintenanceDue => Priority::Medium,
            NotificationKind::IncompleteData => Priority::Low,
            NotificationKind::SystemAlert => Priority::High,
            NotificationKind::FuelReport => Priority::Low,
            NotificationKind::ArrivalConfirmation => Priority::Low,
            NotificationKind::WarehouseReceipt => Priority::Medium,
        }
    }

    /// Default delivery channels for this kind. A dispatch may restrict to a
    /// subset of these but never extend beyond them.
    pub fn default_channels(self) -> &'static [Channel] {
        match self {
            NotificationKind::TaskOverdue => &[Channel::Telegram, Channel::Email],
            NotificationKind::LowStock => &[Channel::Telegram],
            NotificationKind::MachineOffline => &[Channel::Telegram, Channel::Email],
            NotificationKind::RouteCompleted => &[Channel::Telegram],
            NotificationKind::MaintenanceDue => &[Channel::Telegram],
            NotificationKind::IncompleteData => &[Channel::Telegram],
            NotificationKind::SystemAlert => &[Channel::Telegram, Channel::Email],
            NotificationKind::FuelReport => &[Channel::Telegram],
            NotificationKind::ArrivalConfirmation => &[Channel::Telegram, Channel::Sms],
            NotificationKind::WarehouseReceipt => &[Channel::Telegram],
        }
    }

    /// Human-readable title used for notification records and email subjects.
    pub fn title(self) -> &'static str {
        match self {
            NotificationKind::TaskOverdue => "Overdue tasks",
            NotificationKind::LowStock => "Low stock",
            NotificationKind::MachineOffline => "Machine offline",
            NotificationKind::RouteCompleted => "Route completed",
            NotificationKind::MaintenanceDue => "Maintenance due",
            NotificationKind::IncompleteData => "Incomplete data",
            NotificationKind::SystemAlert => "System alert",
            NotificationKind::FuelReport => "Fuel report",
            NotificationKind::ArrivalConfirmation => "Arrival confirmation",
            NotificationKind::WarehouseReceipt => "Warehouse receipt",
        }
    }

    /// Markup hint applied by the chat-message sender.
    pub fn markup(self) -> Markup {
        match self {
            NotificationKind::ArrivalConfirmation | NotificationKind::FuelReport => Markup::Plain,
            _ => Markup::Markdown,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationKind::TaskOverdue => "task_overdue",
            NotificationKind::LowStock => "low_stock",
            NotificationKind::MachineOffline => "machine_offline",
            NotificationKind::RouteCompleted => "route_completed",
            NotificationKind::MaintenanceDue => "maintenance_due",
            NotificationKind::IncompleteData => "incomplete_data",
            NotificationKind::SystemAlert => "system_alert",
            NotificationKind::FuelReport => "fuel_report",
            NotificationKind::ArrivalConfirmation => "arrival_confirmation",
            NotificationKind::WarehouseReceipt => "warehouse_receipt",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_overdue" => Ok(NotificationKind::TaskOverdue),
            "low_stock" => Ok(NotificationKind::LowStock),
            "machine_offline" => Ok(NotificationKind::MachineOffline),
            "route_completed" => Ok(NotificationKind::RouteCompleted),
            "maintenance_due" => Ok(NotificationKind::MaintenanceDue),
            "incomplete_data" => Ok(NotificationKind::IncompleteData),
            "system_alert" => Ok(NotificationKind::SystemAlert),
            "fuel_report" => Ok(NotificationKind::FuelReport),
            "arrival_confirmation" => Ok(NotificationKind::ArrivalConfirmation),
            "warehouse_receipt" => Ok(NotificationKind::WarehouseReceipt),
            other => Err(format!("unknown notification kind '{}'", other)),
        }
    }
}

/// Notification priority levels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Notification delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Telegram,
    Email,
    Sms,
}

/// Chat message markup hint (Telegram parse mode).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Markup {
    #[default]
    Plain,
    Markdown,
    Html,
}

/// Notification delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// Role held by a fleet user; determines notification routing and API access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    WarehouseManager,
    Technician,
    Operator,
    Driver,
}

/// A user in the system. The recipient identifier of every dispatch call is
/// a user id; channel addresses are resolved from this record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub chat_id: Option<i64>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
    pub api_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Work item category, used for follow-up task deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Restock,
    Maintenance,
    Repair,
    Audit,
    Other,
}

/// Work item lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses no longer count as open work.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

/// A work item in the task store.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: TaskCategory,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee_id: Option<Uuid>,
    pub machine_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a new task record.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub category: TaskCategory,
    pub priority: Priority,
    pub assignee_id: Option<Uuid>,
    pub machine_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

/// A vending machine in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Machine {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub location: Option<String>,
    pub last_ping: Option<DateTime<Utc>>,
    pub last_maintenance: Option<DateTime<Utc>>,
}

/// A stock item, either loaded in a machine or held in the warehouse
/// (`machine_id` is `None` for warehouse stock).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub machine_id: Option<Uuid>,
    pub name: String,
    pub quantity: i32,
    pub min_quantity: i32,
    pub unit: String,
}

/// One delivery attempt for a (channel, recipient) pair within a dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub channel: Channel,
    pub recipient: Uuid,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Persisted audit record of one dispatch call.
///
/// Created with status `Pending` before any send is attempted; finalized to
/// `Sent` only if every attempt succeeded, otherwise `Failed` with the
/// per-attempt detail retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub recipients: Vec<Uuid>,
    pub priority: Priority,
    pub channels: Vec<Channel>,
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub attempts: Vec<DeliveryAttempt>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Outcome of a dispatch call returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub notification_id: Uuid,
    pub overall_success: bool,
    pub attempts: Vec<DeliveryAttempt>,
}

/// Per-kind notification count.
#[derive(Debug, Clone, Serialize)]
pub struct KindCount {
    pub kind: NotificationKind,
    pub count: i64,
}

/// Aggregated notification statistics over a time window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationStats {
    pub total: i64,
    pub sent: i64,
    pub failed: i64,
    pub pending: i64,
    pub by_kind: Vec<KindCount>,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Telegram => write!(f, "telegram"),
            Channel::Email => write!(f, "email"),
            Channel::Sms => write!(f, "sms"),
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Manager => write!(f, "manager"),
            Role::WarehouseManager => write!(f, "warehouse_manager"),
            Role::Technician => write!(f, "technician"),
            Role::Operator => write!(f, "operator"),
            Role::Driver => write!(f, "driver"),
        }
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskCategory::Restock => write!(f, "restock"),
            TaskCategory::Maintenance => write!(f, "maintenance"),
            TaskCategory::Repair => write!(f, "repair"),
            TaskCategory::Audit => write!(f, "audit"),
            TaskCategory::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in NotificationKind::ALL {
            let parsed: NotificationKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!("price_epoch".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn test_every_kind_has_channels() {
        for kind in NotificationKind::ALL {
            assert!(!kind.default_channels().is_empty());
        }
    }

    #[test]
    fn test_kind_metadata() {
        assert_eq!(NotificationKind::TaskOverdue.priority(), Priority::High);
        assert_eq!(NotificationKind::MaintenanceDue.priority(), Priority::Medium);
        assert!(
            NotificationKind::SystemAlert
                .default_channels()
                .contains(&Channel::Email)
        );
        assert!(
            NotificationKind::ArrivalConfirmation
                .default_channels()
                .contains(&Channel::Sms)
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(!TaskStatus::Created.is_terminal());
    }
}
