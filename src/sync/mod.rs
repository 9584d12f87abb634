pub mod diff;
pub mod scheduler;

pub use scheduler::{SchedulerConfig, SyncDeps, SyncScheduler};
