//! Record-store collaborator interface.
//!
//! The dispatch engine and the scheduled scanner only ever talk to the
//! operational data (users, tasks, machines, inventory, notification audit
//! records) through this trait. Implementations live in `herald-store`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{
    Channel, DeliveryAttempt, DeliveryStatus, InventoryItem, Machine, NewTask, NotificationRecord,
    NotificationStats, Role, Task, TaskCategory, User,
};

/// Filters for notification history queries.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub channel: Option<Channel>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Restrict to records addressed to this recipient.
    pub recipient: Option<Uuid>,
    pub limit: i64,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- users ---

    async fn user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn user_by_api_key(&self, api_key: &str) -> Result<Option<User>, StoreError>;

    /// Active users holding any of the given roles.
    async fn users_by_roles(&self, roles: &[Role]) -> Result<Vec<User>, StoreError>;

    async fn active_users(&self) -> Result<Vec<User>, StoreError>;

    // --- tasks ---

    /// Tasks whose due date is in the past and whose status is not terminal.
    async fn overdue_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, StoreError>;

    /// Whether an open (non-terminal) task of this category already exists
    /// for the given machine. Used by the task generator to deduplicate
    /// follow-up work across repeated scans.
    async fn open_task_exists(
        &self,
        category: TaskCategory,
        machine_id: Option<Uuid>,
    ) -> Result<bool, StoreError>;

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError>;

    // --- inventory ---

    /// Items at or below their minimum quantity. Items without a configured
    /// minimum (`min_quantity <= 0`) are excluded; they surface through the
    /// inventory audit as incomplete data instead.
    async fn understocked_items(&self) -> Result<Vec<InventoryItem>, StoreError>;

    async fn all_items(&self) -> Result<Vec<InventoryItem>, StoreError>;

    // --- machines ---

    async fn machine(&self, id: Uuid) -> Result<Option<Machine>, StoreError>;

    /// Machines whose last ping is older than the cutoff, or that have
    /// never pinged.
    async fn machines_unpinged_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Machine>, StoreError>;

    /// Machines whose last maintenance is older than the cutoff, or that
    /// have never been serviced.
    async fn machines_maintenance_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Machine>, StoreError>;

    // --- notification audit ---

    /// Append a new notification record (status `Pending`). Failure here is
    /// a configuration error and aborts the dispatch — the audit trail is a
    /// precondition, not a best-effort side effect.
    async fn append_notification(&self, record: &NotificationRecord) -> Result<(), StoreError>;

    /// Persist the final status and delivery attempts of a dispatch.
    async fn finalize_notification(
        &self,
        id: Uuid,
        status: DeliveryStatus,
        sent_at: Option<DateTime<Utc>>,
        attempts: &[DeliveryAttempt],
    ) -> Result<(), StoreError>;

    async fn notification_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<NotificationRecord>, StoreError>;

    async fn notification_stats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<NotificationStats, StoreError>;
}
