//! In-memory record store.
//!
//! Backs the engine/scanner/api test suites and database-free local runs.
//! Seeding goes through the `add_*` helpers; everything else is the
//! `RecordStore` trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use herald_common::error::StoreError;
use herald_common::store::{HistoryFilter, RecordStore};
use herald_common::types::{
    DeliveryAttempt, DeliveryStatus, InventoryItem, KindCount, Machine, NewTask,
    NotificationRecord, NotificationStats, Role, Task, TaskCategory, TaskStatus, User,
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    machines: HashMap<Uuid, Machine>,
    items: HashMap<Uuid, InventoryItem>,
    tasks: HashMap<Uuid, Task>,
    notifications: Vec<NotificationRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id, user);
    }

    pub async fn add_machine(&self, machine: Machine) {
        self.inner.write().await.machines.insert(machine.id, machine);
    }

    pub async fn add_item(&self, item: InventoryItem) {
        self.inner.write().await.items.insert(item.id, item);
    }

    pub async fn add_task(&self, task: Task) {
        self.inner.write().await.tasks.insert(task.id, task);
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.inner.read().await.tasks.values().cloned().collect()
    }

    pub async fn notifications(&self) -> Vec<NotificationRecord> {
        self.inner.read().await.notifications.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn user_by_api_key(&self, api_key: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.api_key.as_deref() == Some(api_key))
            .cloned())
    }

    async fn users_by_roles(&self, roles: &[Role]) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .inner
            .read()
            .await
            .users
            .values()
            .filter(|u| u.active && roles.contains(&u.role))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn active_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .inner
            .read()
            .await
            .users
            .values()
            .filter(|u| u.active)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn overdue_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .inner
            .read()
            .await
            .tasks
            .values()
            .filter(|t| !t.status.is_terminal() && t.due_date.is_some_and(|d| d < now))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.due_date);
        Ok(tasks)
    }

    async fn open_task_exists(
        &self,
        category: TaskCategory,
        machine_id: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .tasks
            .values()
            .any(|t| t.category == category && t.machine_id == machine_id && !t.status.is_terminal()))
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let created = Task {
            id: Uuid::new_v4(),
            title: task.title,
            description: task.description,
            category: task.category,
            status: TaskStatus::Created,
            priority: task.priority,
            assignee_id: task.assignee_id,
            machine_id: task.machine_id,
            due_date: task.due_date,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .tasks
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn understocked_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let mut items: Vec<InventoryItem> = self
            .inner
            .read()
            .await
            .items
            .values()
            .filter(|i| i.min_quantity > 0 && i.quantity <= i.min_quantity)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn all_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let mut items: Vec<InventoryItem> =
            self.inner.read().await.items.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn machine(&self, id: Uuid) -> Result<Option<Machine>, StoreError> {
        Ok(self.inner.read().await.machines.get(&id).cloned())
    }

    async fn machines_unpinged_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Machine>, StoreError> {
        let mut machines: Vec<Machine> = self
            .inner
            .read()
            .await
            .machines
            .values()
            .filter(|m| m.last_ping.is_none_or(|p| p < cutoff))
            .cloned()
            .collect();
        machines.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(machines)
    }

    async fn machines_maintenance_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Machine>, StoreError> {
        let mut machines: Vec<Machine> = self
            .inner
            .read()
            .await
            .machines
            .values()
            .filter(|m| m.last_maintenance.is_none_or(|d| d < cutoff))
            .cloned()
            .collect();
        machines.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(machines)
    }

    async fn append_notification(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        self.inner.write().await.notifications.push(record.clone());
        Ok(())
    }

    async fn finalize_notification(
        &self,
        id: Uuid,
        status: DeliveryStatus,
        sent_at: Option<DateTime<Utc>>,
        attempts: &[DeliveryAttempt],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::Other(format!("notification {} not found", id)))?;
        record.status = status;
        record.sent_at = sent_at;
        record.attempts = attempts.to_vec();
        Ok(())
    }

    async fn notification_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let mut records: Vec<NotificationRecord> = self
            .inner
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| filter.channel.is_none_or(|c| n.channels.contains(&c)))
            .filter(|n| filter.recipient.is_none_or(|r| n.recipients.contains(&r)))
            .filter(|n| filter.from.is_none_or(|f| n.created_at >= f))
            .filter(|n| filter.to.is_none_or(|t| n.created_at <= t))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(filter.limit.max(1) as usize);
        Ok(records)
    }

    async fn notification_stats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<NotificationStats, StoreError> {
        let inner = self.inner.read().await;
        let mut stats = NotificationStats::default();
        let mut kinds: HashMap<String, KindCount> = HashMap::new();

        for record in inner
            .notifications
            .iter()
            .filter(|n| n.created_at >= from && n.created_at <= to)
        {
            stats.total += 1;
            match record.status {
                DeliveryStatus::Sent => stats.sent += 1,
                DeliveryStatus::Failed => stats.failed += 1,
                DeliveryStatus::Pending => stats.pending += 1,
            }
            kinds
                .entry(record.kind.to_string())
                .or_insert(KindCount {
                    kind: record.kind,
                    count: 0,
                })
                .count += 1;
        }

        stats.by_kind = kinds.into_values().collect();
        stats.by_kind.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(stats)
    }
}
