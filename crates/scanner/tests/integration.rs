//! Integration tests for the scan routines.
//!
//! Run against the in-memory record store and a recording stub sender —
//! no database or network required.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use herald_channels::{ChannelSender, ChannelSet, SendError, SendMeta};
use herald_common::config::HeraldConfig;
use herald_common::store::RecordStore;
use herald_common::types::{
    Channel, InventoryItem, Machine, NotificationKind, Priority, Role, Task, TaskCategory,
    TaskStatus, User,
};
use herald_engine::dispatcher::NotificationDispatcher;
use herald_scanner::scans::{RoutineKind, ScanError, ScanService};
use herald_store::MemoryStore;
use herald_templates::TemplateRegistry;

// ============================================================
// Helpers
// ============================================================

/// Telegram stub that records sends; optionally sleeps to simulate a slow
/// transport.
struct StubTelegram {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    delay_ms: u64,
}

#[async_trait]
impl ChannelSender for StubTelegram {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn send(&self, address: &str, message: &str, _meta: &SendMeta) -> Result<(), SendError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), message.to_string()));
        Ok(())
    }
}

fn test_config() -> HeraldConfig {
    HeraldConfig {
        database_url: "unused".to_string(),
        db_max_connections: 5,
        jwt_secret: "test-jwt-secret".to_string(),
        jwt_expiry_hours: 24,
        telegram_bot_token: None,
        resend_api_key: None,
        email_from: None,
        ops_scan_interval_minutes: 30,
        low_stock_scan_interval_hours: 24,
        maintenance_scan_interval_hours: 168,
        inventory_audit_interval_hours: 720,
        offline_after_minutes: 15,
        maintenance_interval_days: 30,
    }
}

fn build_service(
    store: Arc<MemoryStore>,
    delay_ms: u64,
) -> (ScanService, Arc<Mutex<Vec<(String, String)>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let channels = ChannelSet::new().with(Arc::new(StubTelegram {
        sent: Arc::clone(&sent),
        delay_ms,
    }));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        TemplateRegistry::new(),
        Arc::new(channels),
    ));
    let service = ScanService::new(store, dispatcher, &test_config());
    (service, sent)
}

fn make_user(name: &str, role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        role,
        chat_id: Some(555),
        email: Some(format!("{}@fleet.example", name.to_lowercase())),
        phone: None,
        active: true,
        api_key: None,
        created_at: Utc::now(),
    }
}

fn make_machine(code: &str, last_ping_min_ago: Option<i64>, last_maint_days_ago: Option<i64>) -> Machine {
    Machine {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: format!("Vending {}", code),
        location: Some("Central Station".to_string()),
        last_ping: last_ping_min_ago.map(|m| Utc::now() - Duration::minutes(m)),
        last_maintenance: last_maint_days_ago.map(|d| Utc::now() - Duration::days(d)),
    }
}

fn make_item(machine_id: Option<Uuid>, name: &str, quantity: i32, min_quantity: i32) -> InventoryItem {
    InventoryItem {
        id: Uuid::new_v4(),
        machine_id,
        name: name.to_string(),
        quantity,
        min_quantity,
        unit: "pcs".to_string(),
    }
}

// ============================================================
// Low-stock routine
// ============================================================

#[tokio::test]
async fn test_low_stock_fires_below_minimum() {
    let store = Arc::new(MemoryStore::new());
    let manager = make_user("Warehouse", Role::WarehouseManager);
    let manager_id = manager.id;
    store.add_user(manager).await;

    let machine = make_machine("VM-042", Some(1), Some(1));
    let machine_id = machine.id;
    store.add_machine(machine).await;
    store
        .add_item(make_item(Some(machine_id), "Espresso beans", 5, 10))
        .await;

    let (service, sent) = build_service(Arc::clone(&store), 0);
    let report = service.run_routine(RoutineKind::LowStock).await.unwrap();

    assert_eq!(report.findings, 1);
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.tasks_created, 1);
    assert_eq!(sent.lock().unwrap().len(), 1);

    let records = store.notifications().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, NotificationKind::LowStock);
    assert_eq!(records[0].recipients, vec![manager_id]);
    assert!(records[0].message.contains("Espresso beans"));

    let tasks = store.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].category, TaskCategory::Restock);
    assert_eq!(tasks[0].priority, Priority::High);
    assert_eq!(tasks[0].machine_id, Some(machine_id));
}

#[tokio::test]
async fn test_low_stock_quiet_above_minimum() {
    let store = Arc::new(MemoryStore::new());
    store
        .add_user(make_user("Warehouse", Role::WarehouseManager))
        .await;
    store.add_item(make_item(None, "Cups", 15, 10)).await;

    let (service, sent) = build_service(Arc::clone(&store), 0);
    let report = service.run_routine(RoutineKind::LowStock).await.unwrap();

    assert_eq!(report.findings, 0);
    assert_eq!(report.dispatched, 0);
    assert!(sent.lock().unwrap().is_empty());
    assert!(store.notifications().await.is_empty());
    assert!(store.tasks().await.is_empty());
}

#[tokio::test]
async fn test_low_stock_groups_items_by_machine() {
    let store = Arc::new(MemoryStore::new());
    store
        .add_user(make_user("Warehouse", Role::WarehouseManager))
        .await;

    let machine = make_machine("VM-001", Some(1), Some(1));
    let machine_id = machine.id;
    store.add_machine(machine).await;
    store
        .add_item(make_item(Some(machine_id), "Beans", 2, 10))
        .await;
    store
        .add_item(make_item(Some(machine_id), "Cups", 4, 50))
        .await;

    let (service, _sent) = build_service(Arc::clone(&store), 0);
    let report = service.run_routine(RoutineKind::LowStock).await.unwrap();

    // Two findings, one grouped notification, one restock task.
    assert_eq!(report.findings, 2);
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.tasks_created, 1);
    let records = store.notifications().await;
    assert!(records[0].message.contains("Beans"));
    assert!(records[0].message.contains("Cups"));
}

// ============================================================
// Maintenance routine
// ============================================================

#[tokio::test]
async fn test_maintenance_due_creates_task_and_notification() {
    let store = Arc::new(MemoryStore::new());
    store.add_user(make_user("Tech", Role::Technician)).await;

    let machine = make_machine("VM-007", Some(1), Some(35));
    let machine_id = machine.id;
    store.add_machine(machine).await;

    let (service, _sent) = build_service(Arc::clone(&store), 0);
    let report = service.run_routine(RoutineKind::Maintenance).await.unwrap();

    assert_eq!(report.findings, 1);
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.tasks_created, 1);

    let records = store.notifications().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, NotificationKind::MaintenanceDue);
    assert!(records[0].message.contains("35 days ago"));

    let tasks = store.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].category, TaskCategory::Maintenance);
    assert_eq!(tasks[0].priority, Priority::Medium);
    assert_eq!(tasks[0].machine_id, Some(machine_id));
    let due = tasks[0].due_date.unwrap();
    let hours_out = (due - Utc::now()).num_hours();
    assert!((167..=168).contains(&hours_out), "due in {} hours", hours_out);
}

#[tokio::test]
async fn test_maintenance_second_scan_deduplicates_task() {
    let store = Arc::new(MemoryStore::new());
    store.add_user(make_user("Tech", Role::Technician)).await;
    store.add_machine(make_machine("VM-007", Some(1), Some(35))).await;

    let (service, _sent) = build_service(Arc::clone(&store), 0);
    service.run_routine(RoutineKind::Maintenance).await.unwrap();
    let second = service.run_routine(RoutineKind::Maintenance).await.unwrap();

    // The condition persists, so it is re-notified, but the open task is
    // not duplicated.
    assert_eq!(second.dispatched, 1);
    assert_eq!(second.tasks_created, 0);
    assert_eq!(store.tasks().await.len(), 1);
    assert_eq!(store.notifications().await.len(), 2);
}

#[tokio::test]
async fn test_recently_serviced_machine_not_flagged() {
    let store = Arc::new(MemoryStore::new());
    store.add_user(make_user("Tech", Role::Technician)).await;
    store.add_machine(make_machine("VM-008", Some(1), Some(10))).await;

    let (service, _sent) = build_service(Arc::clone(&store), 0);
    let report = service.run_routine(RoutineKind::Maintenance).await.unwrap();

    assert_eq!(report.findings, 0);
    assert!(store.notifications().await.is_empty());
}

// ============================================================
// Operations routine
// ============================================================

#[tokio::test]
async fn test_overdue_tasks_grouped_by_assignee() {
    let store = Arc::new(MemoryStore::new());
    let manager = make_user("Manager", Role::Manager);
    let manager_id = manager.id;
    store.add_user(manager).await;
    let operator = make_user("Operator", Role::Operator);
    let operator_id = operator.id;
    store.add_user(operator).await;

    for i in 0..2 {
        store
            .add_task(Task {
                id: Uuid::new_v4(),
                title: format!("Refill machine {}", i),
                description: String::new(),
                category: TaskCategory::Other,
                status: TaskStatus::Assigned,
                priority: Priority::Medium,
                assignee_id: Some(operator_id),
                machine_id: None,
                due_date: Some(Utc::now() - Duration::days(1)),
                created_at: Utc::now() - Duration::days(3),
            })
            .await;
    }

    let (service, _sent) = build_service(Arc::clone(&store), 0);
    let report = service.run_routine(RoutineKind::Operations).await.unwrap();

    // Two overdue tasks share one assignee: a single grouped notification.
    assert_eq!(report.findings, 2);
    assert_eq!(report.dispatched, 1);

    let records = store.notifications().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, NotificationKind::TaskOverdue);
    assert!(records[0].recipients.contains(&operator_id));
    assert!(records[0].recipients.contains(&manager_id));
    assert!(records[0].message.contains("2 overdue task(s)"));
}

#[tokio::test]
async fn test_offline_machine_notified_and_repair_task_created() {
    let store = Arc::new(MemoryStore::new());
    store.add_user(make_user("Tech", Role::Technician)).await;

    let offline = make_machine("VM-100", Some(60), Some(1));
    let offline_id = offline.id;
    store.add_machine(offline).await;
    // A machine that pinged recently must not be flagged.
    store.add_machine(make_machine("VM-101", Some(2), Some(1))).await;

    let (service, _sent) = build_service(Arc::clone(&store), 0);
    let report = service.run_routine(RoutineKind::Operations).await.unwrap();

    assert_eq!(report.findings, 1);
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.tasks_created, 1);

    let records = store.notifications().await;
    assert_eq!(records[0].kind, NotificationKind::MachineOffline);
    assert!(records[0].message.contains("VM-100"));
    assert!(!records[0].message.contains("VM-101"));

    let tasks = store.tasks().await;
    assert_eq!(tasks[0].category, TaskCategory::Repair);
    assert_eq!(tasks[0].machine_id, Some(offline_id));
}

// ============================================================
// Inventory audit routine
// ============================================================

#[tokio::test]
async fn test_inventory_audit_summarizes_and_flags_incomplete() {
    let store = Arc::new(MemoryStore::new());
    store.add_user(make_user("Admin", Role::Admin)).await;

    store.add_item(make_item(None, "Beans", 5, 10)).await;
    store.add_item(make_item(None, "Cups", 100, 50)).await;
    // No minimum configured: incomplete reference data.
    store.add_item(make_item(None, "Stirrers", 40, 0)).await;

    let (service, _sent) = build_service(Arc::clone(&store), 0);
    let report = service
        .run_routine(RoutineKind::InventoryAudit)
        .await
        .unwrap();

    assert_eq!(report.findings, 3);
    assert_eq!(report.dispatched, 2);

    let records = store.notifications().await;
    let kinds: Vec<NotificationKind> = records.iter().map(|r| r.kind).collect();
    assert!(kinds.contains(&NotificationKind::SystemAlert));
    assert!(kinds.contains(&NotificationKind::IncompleteData));

    let incomplete = records
        .iter()
        .find(|r| r.kind == NotificationKind::IncompleteData)
        .unwrap();
    assert!(incomplete.message.contains("Stirrers"));
}

// ============================================================
// Overlap guard
// ============================================================

#[tokio::test]
async fn test_routine_does_not_overlap_itself() {
    let store = Arc::new(MemoryStore::new());
    store
        .add_user(make_user("Warehouse", Role::WarehouseManager))
        .await;
    store.add_item(make_item(None, "Beans", 1, 10)).await;

    // Slow transport keeps the first pass in flight.
    let (service, _sent) = build_service(Arc::clone(&store), 300);
    let service = Arc::new(service);

    let first = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.run_routine(RoutineKind::LowStock).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let second = service.run_routine(RoutineKind::LowStock).await;
    assert!(matches!(second, Err(ScanError::InProgress(_))));

    // A different routine interleaves freely while low-stock is running.
    let other = service.run_routine(RoutineKind::Maintenance).await;
    assert!(other.is_ok());

    let report = first.await.unwrap().unwrap();
    assert_eq!(report.dispatched, 1);

    // Once the first pass finishes the guard is released.
    let third = service.run_routine(RoutineKind::LowStock).await;
    assert!(third.is_ok());
}
