pub mod scans;
pub mod scheduler;

pub use scans::{RoutineKind, ScanError, ScanReport, ScanService};
pub use scheduler::ScanScheduler;
