//! PostgreSQL-backed record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use herald_common::error::StoreError;
use herald_common::store::{HistoryFilter, RecordStore};
use herald_common::types::{
    Channel, DeliveryAttempt, DeliveryStatus, InventoryItem, KindCount, Machine, NewTask,
    NotificationKind, NotificationRecord, NotificationStats, Priority, Role, Task, TaskCategory,
    User,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Row shape for the `notifications` table; list-valued fields are JSONB.
#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    kind: NotificationKind,
    title: String,
    message: String,
    recipients: Json<Vec<Uuid>>,
    priority: Priority,
    channels: Json<Vec<Channel>>,
    payload: serde_json::Value,
    status: DeliveryStatus,
    attempts: Json<Vec<DeliveryAttempt>>,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        NotificationRecord {
            id: row.id,
            kind: row.kind,
            title: row.title,
            message: row.message,
            recipients: row.recipients.0,
            priority: row.priority,
            channels: row.channels.0,
            payload: row.payload,
            status: row.status,
            attempts: row.attempts.0,
            created_at: row.created_at,
            sent_at: row.sent_at,
        }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn user_by_api_key(&self, api_key: &str) -> Result<Option<User>, StoreError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE api_key = $1")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn users_by_roles(&self, roles: &[Role]) -> Result<Vec<User>, StoreError> {
        let role_names: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        let users: Vec<User> = sqlx::query_as(
            "SELECT * FROM users WHERE active = true AND role = ANY($1) ORDER BY name",
        )
        .bind(&role_names)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn active_users(&self) -> Result<Vec<User>, StoreError> {
        let users: Vec<User> =
            sqlx::query_as("SELECT * FROM users WHERE active = true ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(users)
    }

    async fn overdue_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, StoreError> {
        let tasks: Vec<Task> = sqlx::query_as(
            r#"
            SELECT * FROM tasks
            WHERE due_date IS NOT NULL
              AND due_date < $1
              AND status NOT IN ('completed', 'cancelled')
            ORDER BY due_date
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn open_task_exists(
        &self,
        category: TaskCategory,
        machine_id: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM tasks
                WHERE category = $1
                  AND machine_id IS NOT DISTINCT FROM $2
                  AND status NOT IN ('completed', 'cancelled')
            )
            "#,
        )
        .bind(category)
        .bind(machine_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let created: Task = sqlx::query_as(
            r#"
            INSERT INTO tasks (id, title, description, category, status, priority, assignee_id, machine_id, due_date)
            VALUES ($1, $2, $3, $4, 'created', $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.category)
        .bind(task.priority)
        .bind(task.assignee_id)
        .bind(task.machine_id)
        .bind(task.due_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn understocked_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let items: Vec<InventoryItem> = sqlx::query_as(
            r#"
            SELECT * FROM inventory_items
            WHERE min_quantity > 0 AND quantity <= min_quantity
            ORDER BY machine_id, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn all_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let items: Vec<InventoryItem> =
            sqlx::query_as("SELECT * FROM inventory_items ORDER BY machine_id, name")
                .fetch_all(&self.pool)
                .await?;
        Ok(items)
    }

    async fn machine(&self, id: Uuid) -> Result<Option<Machine>, StoreError> {
        let machine: Option<Machine> = sqlx::query_as("SELECT * FROM machines WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(machine)
    }

    async fn machines_unpinged_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Machine>, StoreError> {
        let machines: Vec<Machine> = sqlx::query_as(
            "SELECT * FROM machines WHERE last_ping IS NULL OR last_ping < $1 ORDER BY code",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(machines)
    }

    async fn machines_maintenance_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Machine>, StoreError> {
        let machines: Vec<Machine> = sqlx::query_as(
            r#"
            SELECT * FROM machines
            WHERE last_maintenance IS NULL OR last_maintenance < $1
            ORDER BY code
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(machines)
    }

    async fn append_notification(&self, record: &NotificationRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, kind, title, message, recipients, priority, channels, payload, status, attempts, created_at, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id)
        .bind(record.kind)
        .bind(&record.title)
        .bind(&record.message)
        .bind(Json(&record.recipients))
        .bind(record.priority)
        .bind(Json(&record.channels))
        .bind(&record.payload)
        .bind(record.status)
        .bind(Json(&record.attempts))
        .bind(record.created_at)
        .bind(record.sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finalize_notification(
        &self,
        id: Uuid,
        status: DeliveryStatus,
        sent_at: Option<DateTime<Utc>>,
        attempts: &[DeliveryAttempt],
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE notifications SET status = $1, sent_at = $2, attempts = $3 WHERE id = $4")
            .bind(status)
            .bind(sent_at)
            .bind(Json(attempts))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn notification_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM notifications WHERE true");

        if let Some(channel) = filter.channel {
            qb.push(" AND channels @> ");
            qb.push_bind(Json(vec![channel]));
        }
        if let Some(recipient) = filter.recipient {
            qb.push(" AND recipients @> ");
            qb.push_bind(Json(vec![recipient]));
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ");
            qb.push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at <= ");
            qb.push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind(filter.limit.max(1));

        let rows: Vec<NotificationRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(NotificationRecord::from).collect())
    }

    async fn notification_stats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<NotificationStats, StoreError> {
        let by_status: Vec<(DeliveryStatus, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) FROM notifications
            WHERE created_at >= $1 AND created_at <= $2
            GROUP BY status
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let by_kind: Vec<(NotificationKind, i64)> = sqlx::query_as(
            r#"
            SELECT kind, COUNT(*) FROM notifications
            WHERE created_at >= $1 AND created_at <= $2
            GROUP BY kind
            ORDER BY COUNT(*) DESC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = NotificationStats::default();
        for (status, count) in by_status {
            stats.total += count;
            match status {
                DeliveryStatus::Sent => stats.sent = count,
                DeliveryStatus::Failed => stats.failed = count,
                DeliveryStatus::Pending => stats.pending = count,
            }
        }
        stats.by_kind = by_kind
            .into_iter()
            .map(|(kind, count)| KindCount { kind, count })
            .collect();

        Ok(stats)
    }
}
