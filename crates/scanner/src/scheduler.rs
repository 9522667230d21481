//! Interval scheduler driving the scan routines.
//!
//! One tokio task per routine, each on its own named interval from
//! configuration. The first tick fires immediately, so every routine runs
//! a pass at startup.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use herald_common::config::HeraldConfig;

use crate::scans::{RoutineKind, ScanError, ScanService};

pub struct ScanScheduler {
    service: Arc<ScanService>,
    routines: Vec<(RoutineKind, Duration)>,
}

impl ScanScheduler {
    pub fn new(service: Arc<ScanService>, config: &HeraldConfig) -> Self {
        Self {
            service,
            routines: vec![
                (RoutineKind::Operations, config.ops_scan_interval()),
                (RoutineKind::LowStock, config.low_stock_scan_interval()),
                (RoutineKind::Maintenance, config.maintenance_scan_interval()),
                (
                    RoutineKind::InventoryAudit,
                    config.inventory_audit_interval(),
                ),
            ],
        }
    }

    /// Run all routine loops. Returns only if a routine task dies.
    pub async fn run(self) -> anyhow::Result<()> {
        let mut join_set = JoinSet::new();

        for (routine, every) in self.routines {
            let service = Arc::clone(&self.service);
            tracing::info!(%routine, interval_secs = every.as_secs(), "Scan routine scheduled");

            join_set.spawn(async move {
                let mut ticker = tokio::time::interval(every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    match service.run_routine(routine).await {
                        Ok(report) => tracing::info!(
                            %routine,
                            findings = report.findings,
                            dispatched = report.dispatched,
                            tasks_created = report.tasks_created,
                            "Scan pass complete"
                        ),
                        // Already logged at the guard; nothing to do here.
                        Err(ScanError::InProgress(_)) => {}
                        // Routine-level failure: give up on this pass and
                        // let the next tick retry.
                        Err(e) => tracing::error!(%routine, error = %e, "Scan pass failed"),
                    }
                }
            });
        }

        while let Some(joined) = join_set.join_next().await {
            joined?;
        }
        Ok(())
    }
}
