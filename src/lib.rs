//! Keeps profiling-dump directories bounded.
//!
//! A profiler running in loop mode writes a new dump file every few minutes;
//! at around 15MB per five minutes the directory fills up quickly. This crate
//! deletes dumps older than a configured age on a self-tuned schedule.
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::time::Duration;
//!
//! use dumpsweep::retention::{self, RetentionPolicy};
//!
//! let policy = RetentionPolicy::new("profiles", ".jfr", Duration::from_secs(24 * 3600))?;
//! let handle = retention::start(policy);
//! // ... later, on shutdown
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod observability;
pub mod profiler;
pub mod retention;
