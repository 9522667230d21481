//! Scheduled scan routines over operational state.
//!
//! Four independent routines query the record store for stale or
//! out-of-threshold entities, group the findings by logical owner, create
//! follow-up tasks where the finding implies new work, and dispatch the
//! matching notification kind. The same methods serve the interval
//! scheduler and the privileged manual-trigger API — there is no separate
//! code path for forced scans.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use herald_common::config::HeraldConfig;
use herald_common::error::StoreError;
use herald_common::store::RecordStore;
use herald_common::types::{
    InventoryItem, Machine, NotificationKind, Priority, Role, Task, TaskCategory,
};
use herald_engine::dispatcher::{DispatchOptions, NotificationDispatcher};
use herald_engine::taskgen::{FollowUp, TaskGenerator};

/// The four scan routines, each on its own cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Operations,
    LowStock,
    Maintenance,
    InventoryAudit,
}

impl RoutineKind {
    fn index(self) -> usize {
        match self {
            RoutineKind::Operations => 0,
            RoutineKind::LowStock => 1,
            RoutineKind::Maintenance => 2,
            RoutineKind::InventoryAudit => 3,
        }
    }
}

impl std::fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutineKind::Operations => write!(f, "operations"),
            RoutineKind::LowStock => write!(f, "low-stock"),
            RoutineKind::Maintenance => write!(f, "maintenance"),
            RoutineKind::InventoryAudit => write!(f, "inventory-audit"),
        }
    }
}

impl std::str::FromStr for RoutineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operations" => Ok(RoutineKind::Operations),
            "low-stock" => Ok(RoutineKind::LowStock),
            "maintenance" => Ok(RoutineKind::Maintenance),
            "inventory-audit" => Ok(RoutineKind::InventoryAudit),
            other => Err(format!("unknown scan routine '{}'", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    /// The previous pass of this routine is still in flight.
    #[error("scan routine '{0}' is already in progress")]
    InProgress(RoutineKind),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary of one scan pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScanReport {
    pub routine: String,
    pub findings: usize,
    pub dispatched: usize,
    pub tasks_created: usize,
}

pub struct ScanService {
    store: Arc<dyn RecordStore>,
    dispatcher: Arc<NotificationDispatcher>,
    taskgen: TaskGenerator,
    offline_after: Duration,
    maintenance_interval: Duration,
    // One guard per routine: a pass must not start while the previous pass
    // of the same routine is still running. Different routines interleave.
    guards: [Mutex<()>; 4],
}

impl ScanService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        dispatcher: Arc<NotificationDispatcher>,
        config: &HeraldConfig,
    ) -> Self {
        Self {
            taskgen: TaskGenerator::new(Arc::clone(&store)),
            store,
            dispatcher,
            offline_after: Duration::minutes(config.offline_after_minutes),
            maintenance_interval: Duration::days(config.maintenance_interval_days),
            guards: Default::default(),
        }
    }

    /// Run one routine, guarded against overlapping with itself.
    pub async fn run_routine(&self, routine: RoutineKind) -> Result<ScanReport, ScanError> {
        let guard = &self.guards[routine.index()];
        let Ok(_lock) = guard.try_lock() else {
            tracing::warn!(%routine, "Previous pass still running, skipping");
            return Err(ScanError::InProgress(routine));
        };

        tracing::debug!(%routine, "Scan pass starting");
        let report = match routine {
            RoutineKind::Operations => self.scan_operations().await?,
            RoutineKind::LowStock => self.scan_low_stock().await?,
            RoutineKind::Maintenance => self.scan_maintenance().await?,
            RoutineKind::InventoryAudit => self.scan_inventory_audit().await?,
        };
        Ok(report)
    }

    /// Operational check: overdue tasks grouped by assignee, plus machines
    /// that stopped pinging.
    async fn scan_operations(&self) -> Result<ScanReport, StoreError> {
        let mut report = ScanReport {
            routine: RoutineKind::Operations.to_string(),
            ..Default::default()
        };
        let now = Utc::now();

        // Overdue tasks: one notification per assignee, managers copied in.
        let overdue = self.store.overdue_tasks(now).await?;
        report.findings += overdue.len();

        let managers = self.role_recipients(&[Role::Manager]).await?;
        let mut by_assignee: BTreeMap<Option<Uuid>, Vec<&Task>> = BTreeMap::new();
        for task in &overdue {
            by_assignee.entry(task.assignee_id).or_default().push(task);
        }

        for (assignee_id, tasks) in by_assignee {
            let assignee_name = match assignee_id {
                Some(id) => match self.store.user(id).await {
                    Ok(Some(user)) => user.name,
                    Ok(None) => format!("user {}", id),
                    Err(e) => {
                        tracing::error!(error = %e, "Assignee lookup failed, skipping group");
                        continue;
                    }
                },
                None => "Unassigned".to_string(),
            };

            let mut recipients = managers.clone();
            if let Some(id) = assignee_id
                && !recipients.contains(&id)
            {
                recipients.insert(0, id);
            }

            let task_lines = tasks
                .iter()
                .map(|t| {
                    let due = t
                        .due_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default();
                    format!("• {} (due {})", t.title, due)
                })
                .collect::<Vec<_>>()
                .join("\n");

            let payload = serde_json::json!({
                "assignee": assignee_name,
                "count": tasks.len(),
                "tasks": task_lines,
            });
            if self
                .dispatch_finding(NotificationKind::TaskOverdue, &recipients, payload)
                .await
            {
                report.dispatched += 1;
            }
        }

        // Offline machines: one aggregated notification, one repair task
        // per machine.
        let cutoff = now - self.offline_after;
        let offline = self.store.machines_unpinged_since(cutoff).await?;
        report.findings += offline.len();

        if !offline.is_empty() {
            let recipients = self
                .role_recipients(&[Role::Technician, Role::Manager])
                .await?;
            let machine_lines = offline
                .iter()
                .map(|m| format!("• {}", machine_label(m)))
                .collect::<Vec<_>>()
                .join("\n");
            let payload = serde_json::json!({
                "count": offline.len(),
                "machines": machine_lines,
                "minutes": self.offline_after.num_minutes(),
            });
            if self
                .dispatch_finding(NotificationKind::MachineOffline, &recipients, payload)
                .await
            {
                report.dispatched += 1;
            }

            for machine in &offline {
                let follow_up = FollowUp {
                    title: format!("Check offline machine {}", machine.code),
                    description: format!(
                        "{} has not pinged for over {} minutes",
                        machine_label(machine),
                        self.offline_after.num_minutes()
                    ),
                    category: TaskCategory::Repair,
                    priority: Priority::High,
                    machine_id: Some(machine.id),
                    assignee_id: None,
                    due_in_days: 1,
                };
                report.tasks_created += self.create_follow_up(&follow_up).await;
            }
        }

        Ok(report)
    }

    /// Understocked items grouped by machine; warehouse managers notified,
    /// one restock task per group.
    async fn scan_low_stock(&self) -> Result<ScanReport, StoreError> {
        let mut report = ScanReport {
            routine: RoutineKind::LowStock.to_string(),
            ..Default::default()
        };

        let items = self.store.understocked_items().await?;
        report.findings = items.len();
        if items.is_empty() {
            return Ok(report);
        }

        let recipients = self.role_recipients(&[Role::WarehouseManager]).await?;

        let mut by_machine: BTreeMap<Option<Uuid>, Vec<&InventoryItem>> = BTreeMap::new();
        for item in &items {
            by_machine.entry(item.machine_id).or_default().push(item);
        }

        for (machine_id, group) in by_machine {
            let machine_name = match machine_id {
                Some(id) => match self.store.machine(id).await {
                    Ok(Some(machine)) => machine_label(&machine),
                    Ok(None) => format!("machine {}", id),
                    Err(e) => {
                        tracing::error!(error = %e, "Machine lookup failed, skipping group");
                        continue;
                    }
                },
                None => "warehouse".to_string(),
            };

            let item_lines = group
                .iter()
                .map(|i| format!("• {}: {}/{} {}", i.name, i.quantity, i.min_quantity, i.unit))
                .collect::<Vec<_>>()
                .join("\n");
            let payload = serde_json::json!({
                "machine": machine_name,
                "count": group.len(),
                "items": item_lines,
            });
            if self
                .dispatch_finding(NotificationKind::LowStock, &recipients, payload)
                .await
            {
                report.dispatched += 1;
            }

            let follow_up = FollowUp {
                title: format!("Restock {}", machine_name),
                description: format!("{} item(s) at or below minimum:\n{}", group.len(), item_lines),
                category: TaskCategory::Restock,
                priority: Priority::High,
                machine_id,
                assignee_id: None,
                due_in_days: 3,
            };
            report.tasks_created += self.create_follow_up(&follow_up).await;
        }

        Ok(report)
    }

    /// Machines past their maintenance interval (or never serviced): one
    /// notification and one maintenance task per machine.
    async fn scan_maintenance(&self) -> Result<ScanReport, StoreError> {
        let mut report = ScanReport {
            routine: RoutineKind::Maintenance.to_string(),
            ..Default::default()
        };
        let now = Utc::now();

        let cutoff = now - self.maintenance_interval;
        let machines = self.store.machines_maintenance_before(cutoff).await?;
        report.findings = machines.len();
        if machines.is_empty() {
            return Ok(report);
        }

        let recipients = self.role_recipients(&[Role::Technician]).await?;

        for machine in &machines {
            let (last, days) = match machine.last_maintenance {
                Some(date) => (
                    date.format("%Y-%m-%d").to_string(),
                    (now - date).num_days().to_string(),
                ),
                None => (
                    "never".to_string(),
                    format!("{}+", self.maintenance_interval.num_days()),
                ),
            };
            let payload = serde_json::json!({
                "machine": machine_label(machine),
                "last": last,
                "days": days,
            });
            if self
                .dispatch_finding(NotificationKind::MaintenanceDue, &recipients, payload)
                .await
            {
                report.dispatched += 1;
            }

            let follow_up = FollowUp {
                title: format!("Maintenance for {}", machine.code),
                description: format!("{} last serviced {}", machine_label(machine), last),
                category: TaskCategory::Maintenance,
                priority: Priority::Medium,
                machine_id: Some(machine.id),
                assignee_id: None,
                due_in_days: 7,
            };
            report.tasks_created += self.create_follow_up(&follow_up).await;
        }

        Ok(report)
    }

    /// Full inventory pass: a summary alert for managers plus an
    /// incomplete-data notice for items missing their reference minimums.
    async fn scan_inventory_audit(&self) -> Result<ScanReport, StoreError> {
        let mut report = ScanReport {
            routine: RoutineKind::InventoryAudit.to_string(),
            ..Default::default()
        };

        let items = self.store.all_items().await?;
        report.findings = items.len();

        let recipients = self.role_recipients(&[Role::Admin, Role::Manager]).await?;

        let below_min = items
            .iter()
            .filter(|i| i.min_quantity > 0 && i.quantity <= i.min_quantity)
            .count();
        let payload = serde_json::json!({
            "title": "Inventory audit",
            "message": format!(
                "{} item(s) audited, {} at or below minimum stock",
                items.len(),
                below_min
            ),
        });
        if self
            .dispatch_finding(NotificationKind::SystemAlert, &recipients, payload)
            .await
        {
            report.dispatched += 1;
        }

        let incomplete: Vec<&InventoryItem> = items
            .iter()
            .filter(|i| i.min_quantity <= 0 || i.name.trim().is_empty())
            .collect();
        if !incomplete.is_empty() {
            let names = incomplete
                .iter()
                .map(|i| {
                    if i.name.trim().is_empty() {
                        i.id.to_string()
                    } else {
                        i.name.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            let payload = serde_json::json!({
                "entity": names,
                "fields": "min_quantity",
            });
            if self
                .dispatch_finding(NotificationKind::IncompleteData, &recipients, payload)
                .await
            {
                report.dispatched += 1;
            }
        }

        Ok(report)
    }

    /// Active users holding any of the given roles, as recipient ids.
    async fn role_recipients(&self, roles: &[Role]) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .store
            .users_by_roles(roles)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect())
    }

    /// Dispatch one finding's notification. Failures are logged and the
    /// scan continues — one finding must not abort the rest of the pass.
    /// Returns whether a dispatch call completed (partial delivery counts).
    async fn dispatch_finding(
        &self,
        kind: NotificationKind,
        recipients: &[Uuid],
        payload: serde_json::Value,
    ) -> bool {
        if recipients.is_empty() {
            tracing::warn!(kind = %kind, "No recipients resolved for finding, skipping dispatch");
            return false;
        }
        match self
            .dispatcher
            .dispatch(kind, recipients, payload, DispatchOptions::default())
            .await
        {
            Ok(result) => {
                if !result.overall_success {
                    tracing::warn!(
                        kind = %kind,
                        notification_id = %result.notification_id,
                        "Finding dispatched with partial delivery failure"
                    );
                }
                true
            }
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "Finding dispatch failed");
                false
            }
        }
    }

    /// Create one follow-up task, tolerating per-finding failures.
    /// Returns 1 if a task was created, 0 if deduplicated or errored.
    async fn create_follow_up(&self, follow_up: &FollowUp) -> usize {
        match self.taskgen.follow_up(follow_up).await {
            Ok(Some(_)) => 1,
            Ok(None) => 0,
            Err(e) => {
                tracing::error!(error = %e, "Follow-up task creation failed");
                0
            }
        }
    }
}

fn machine_label(machine: &Machine) -> String {
    match &machine.location {
        Some(location) => format!("{} {} ({})", machine.code, machine.name, location),
        None => format!("{} {}", machine.code, machine.name),
    }
}
