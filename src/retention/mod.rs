//! Retention of profiling dump files.
//!
//! This module provides a background scheduler that periodically:
//! 1. Lists the dump directory (non-recursively)
//! 2. Selects regular files with the dump suffix older than the maximum age
//! 3. Deletes them one by one, tolerating individual failures
//!
//! The sweep cadence adapts to the maximum age: hourly for retention windows
//! of an hour or more, every minute for shorter (experimental) windows.

mod error;
mod policy;
mod scheduler;
mod sweep;

pub use error::{RetentionError, RetentionResult};
pub use policy::{
    Cadence, CadenceUnit, RetentionPolicy, STEADY_STATE_THRESHOLD, WARM_UP_DELAY, format_max_age,
};
pub use scheduler::{RetentionScheduler, SchedulerHandle, SchedulerState, SchedulerStatus, start};
pub use sweep::{
    CandidateFile, DeleteFailure, DumpRemover, FsRemover, SweepResult, find_expired_dumps,
    has_dump_suffix, is_expired, sweep,
};
