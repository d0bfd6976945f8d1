//! Retention policy and cadence selection.
//!
//! A [`RetentionPolicy`] is built once from configuration and never changes
//! afterwards. The sweep cadence is derived from its maximum age:
//!
//! - a maximum age of at least one hour is a production setting and the
//!   directory is swept once an hour;
//! - anything shorter is treated as an experiment and swept once a minute.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};

use super::error::{RetentionError, RetentionResult};

/// Delay before the first sweep, giving the profiler time to write its first dump.
pub const WARM_UP_DELAY: Duration = Duration::from_secs(2 * 60);

/// Maximum ages below this value switch the scheduler to per-minute sweeps.
pub const STEADY_STATE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// Number of cadence units between two sweeps.
const PERIOD: u64 = 60;

/// Which files to delete from which directory, and when they count as expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    directory: PathBuf,
    suffix: String,
    max_age: Duration,
}

impl RetentionPolicy {
    /// Create a policy, rejecting suffixes that are not a proper file-name ending.
    pub fn new(
        directory: impl Into<PathBuf>,
        suffix: impl Into<String>,
        max_age: Duration,
    ) -> RetentionResult<Self> {
        let suffix = suffix.into();
        if !is_valid_suffix(&suffix) {
            return Err(RetentionError::InvalidSuffix(suffix));
        }

        Ok(Self {
            directory: directory.into(),
            suffix,
            max_age,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Files modified strictly before this instant are expired.
    ///
    /// Saturates to the earliest representable instant when `max_age` reaches
    /// further back than chrono can express, so nothing is ever expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn cadence(&self) -> Cadence {
        Cadence::for_max_age(self.max_age)
    }

    /// Shell-like summary of the policy, e.g. `rm ./*.jfr -mtime 1d0h0m every 60 minutes`.
    pub fn describe(&self) -> String {
        let cadence = self.cadence();
        format!(
            "rm {}/*{} -mtime {} every {} {}",
            self.directory.display(),
            self.suffix,
            format_max_age(self.max_age),
            cadence.period_count,
            cadence.unit,
        )
    }
}

fn is_valid_suffix(suffix: &str) -> bool {
    suffix.len() > 1 && suffix.starts_with('.') && !suffix.contains(|c: char| c == '/' || c == '\\')
}

/// Time unit of the sweep period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceUnit {
    Seconds,
    Minutes,
}

impl CadenceUnit {
    fn as_secs(self) -> u64 {
        match self {
            CadenceUnit::Seconds => 1,
            CadenceUnit::Minutes => 60,
        }
    }
}

impl fmt::Display for CadenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CadenceUnit::Seconds => f.write_str("seconds"),
            CadenceUnit::Minutes => f.write_str("minutes"),
        }
    }
}

/// When sweeps run: once after `initial_delay`, then every `period_count` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub initial_delay: Duration,
    pub period_count: u64,
    pub unit: CadenceUnit,
}

impl Cadence {
    pub fn for_max_age(max_age: Duration) -> Self {
        let unit = if max_age < STEADY_STATE_THRESHOLD {
            CadenceUnit::Seconds
        } else {
            CadenceUnit::Minutes
        };

        Self {
            initial_delay: WARM_UP_DELAY,
            period_count: PERIOD,
            unit,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_count.saturating_mul(self.unit.as_secs()))
    }
}

/// Render a duration as `<days>d<hours>h<minutes>m`; seconds are dropped.
pub fn format_max_age(max_age: Duration) -> String {
    let secs = max_age.as_secs();
    format!(
        "{}d{}h{}m",
        secs / 86_400,
        (secs % 86_400) / 3_600,
        (secs % 3_600) / 60
    )
}
