//! Follow-up task generation.
//!
//! When a scan finding implies new work (restock, maintenance, repair), a
//! task record is created in the task store alongside the notification.
//! Creation is deduplicated: an open task of the same category for the
//! same machine suppresses a new one, so repeated scans of a persisting
//! condition do not pile up duplicate work items.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use herald_common::error::StoreError;
use herald_common::store::RecordStore;
use herald_common::types::{NewTask, Priority, Task, TaskCategory};

/// A follow-up work item synthesized from a scan finding.
#[derive(Debug, Clone)]
pub struct FollowUp {
    pub title: String,
    pub description: String,
    pub category: TaskCategory,
    pub priority: Priority,
    pub machine_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub due_in_days: i64,
}

pub struct TaskGenerator {
    store: Arc<dyn RecordStore>,
}

impl TaskGenerator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Create the follow-up task unless an open one of the same category
    /// already exists for the machine. Returns `None` when deduplicated.
    pub async fn follow_up(&self, follow_up: &FollowUp) -> Result<Option<Task>, StoreError> {
        if self
            .store
            .open_task_exists(follow_up.category, follow_up.machine_id)
            .await?
        {
            tracing::debug!(
                category = %follow_up.category,
                machine_id = ?follow_up.machine_id,
                "Open follow-up task already exists, skipping"
            );
            return Ok(None);
        }

        let task = self
            .store
            .create_task(NewTask {
                title: follow_up.title.clone(),
                description: follow_up.description.clone(),
                category: follow_up.category,
                priority: follow_up.priority,
                assignee_id: follow_up.assignee_id,
                machine_id: follow_up.machine_id,
                due_date: Some(Utc::now() + Duration::days(follow_up.due_in_days)),
            })
            .await?;

        tracing::info!(
            task_id = %task.id,
            category = %task.category,
            priority = %task.priority,
            "Follow-up task created"
        );

        Ok(Some(task))
    }
}
