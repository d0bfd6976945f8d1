//! Background task that runs dump sweeps on a fixed cadence.
//!
//! The scheduler owns a single tokio task. It waits for the warm-up delay,
//! then sweeps once per period. Sweeps run one after another on that task and
//! can never overlap. A sweep that fails because the directory cannot be
//! listed is logged and retried on the next tick; nothing is propagated to the
//! caller.

use std::sync::Arc;

use chrono::Utc;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{
    policy::{Cadence, RetentionPolicy},
    sweep::{DumpRemover, FsRemover, sweep},
};
use crate::observability::metrics;

/// Lifecycle state of a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick (or for the first one).
    Idle,
    /// A sweep is in progress.
    Sweeping,
    /// The task has exited; no further sweeps will run.
    Stopped,
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    /// Sweeps finished so far, including ones that failed to list the directory.
    pub sweeps_completed: u64,
    /// Files deleted by the most recent sweep, `None` if it failed or none has run.
    pub last_deleted: Option<u64>,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            state: SchedulerState::Idle,
            sweeps_completed: 0,
            last_deleted: None,
        }
    }
}

/// Periodic dump cleanup for one [`RetentionPolicy`].
pub struct RetentionScheduler {
    policy: RetentionPolicy,
    cadence: Cadence,
    remover: Arc<dyn DumpRemover>,
}

impl RetentionScheduler {
    pub fn new(policy: RetentionPolicy) -> Self {
        let cadence = policy.cadence();
        Self {
            policy,
            cadence,
            remover: Arc::new(FsRemover),
        }
    }

    /// Use a different deletion backend.
    pub fn with_remover(mut self, remover: Arc<dyn DumpRemover>) -> Self {
        self.remover = remover;
        self
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// Spawn the sweep task on the current tokio runtime and return immediately.
    pub fn start(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(SchedulerStatus::default());
        let first_tick = Instant::now() + self.cadence.initial_delay;

        tracing::info!(
            directory = %self.policy.directory().display(),
            suffix = %self.policy.suffix(),
            max_age_secs = self.policy.max_age().as_secs(),
            period_secs = self.cadence.period().as_secs(),
            initial_delay_secs = self.cadence.initial_delay.as_secs(),
            "Profiler cleanup started: {}",
            self.policy.describe()
        );

        let task = tokio::spawn(self.run(first_tick, cancel.clone(), status_tx));

        SchedulerHandle {
            cancel,
            status: status_rx,
            task,
        }
    }

    async fn run(
        self,
        first_tick: Instant,
        cancel: CancellationToken,
        status: watch::Sender<SchedulerStatus>,
    ) {
        let mut ticker = tokio::time::interval_at(first_tick, self.cadence.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            status.send_modify(|s| s.state = SchedulerState::Sweeping);

            let deleted = match sweep(&self.policy, self.remover.as_ref(), Utc::now()).await {
                Ok(result) => Some(result.deleted),
                Err(e) => {
                    tracing::error!(error = %e, "Error running dump retention sweep");
                    metrics::record_sweep_error("enumerate");
                    None
                }
            };

            complete_sweep(&status, deleted);
        }

        status.send_modify(|s| s.state = SchedulerState::Stopped);
        tracing::info!(
            directory = %self.policy.directory().display(),
            "Profiler cleanup stopped"
        );
    }
}

/// Count a finished tick, whether or not the directory could be listed.
fn complete_sweep(status: &watch::Sender<SchedulerStatus>, deleted: Option<u64>) {
    metrics::record_sweep();
    status.send_modify(|s| {
        s.state = SchedulerState::Idle;
        s.sweeps_completed += 1;
        s.last_deleted = deleted;
    });
}

/// Start cleaning up `policy.directory()` with the filesystem remover.
pub fn start(policy: RetentionPolicy) -> SchedulerHandle {
    RetentionScheduler::new(policy).start()
}

/// Control handle for a started [`RetentionScheduler`].
///
/// Dropping the handle does not stop the scheduler; it keeps running until
/// [`stop`](Self::stop) is called or the runtime shuts down.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    status: watch::Receiver<SchedulerStatus>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Prevent any further sweep from starting. A sweep already in progress finishes.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }

    pub fn state(&self) -> SchedulerState {
        self.status.borrow().state
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }

    /// Stop the scheduler and wait for its task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Retention scheduler task ended abnormally");
        }
    }
}
