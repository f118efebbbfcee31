pub mod checker;
/// Monitoring engine module - runs configured checks
///
/// This module is responsible for:
/// - Executing web/ping/port checks under a per-kind timeout
/// - Scheduling checks on their own intervals through a bounded worker pool
/// - Validating check targets before they are scheduled
pub mod executor;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use checker::{CheckError, CheckKind, Checker, Probe};
pub use executor::{MonitoringExecutor, Timeouts};
pub use scheduler::MonitoringScheduler;
pub use types::{CheckOutcome, MonitorStatus};
