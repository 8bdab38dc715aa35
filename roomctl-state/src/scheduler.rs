//! Background jobs on a fixed period
//!
//! A job is awaited inside its own loop, so a slow run delays the next tick
//! rather than overlapping with it; ticks missed meanwhile are skipped.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::service::{DeviceService, RefreshOutcome};

/// A named job running every `period` until stopped.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
    runs: Arc<AtomicU64>,
}

impl PeriodicTask {
    /// Spawn the loop. The first run happens one `period` from now.
    pub fn start<F, Fut>(name: &'static str, period: Duration, job: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let runs = Arc::new(AtomicU64::new(0));
        let task_runs = Arc::clone(&runs);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            tracing::debug!(task = name, ?period, "periodic task started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        job().await;
                        task_runs.fetch_add(1, Ordering::Relaxed);
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            tracing::debug!(task = name, "periodic task stopped");
        });

        Self {
            name,
            period,
            shutdown_tx,
            handle,
            runs,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Completed runs so far
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Stop after the current run, if any, and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            tracing::warn!(task = self.name, error = %e, "periodic task ended abnormally");
        }
    }
}

/// Scheduled address refresh.
pub struct RefreshSchedule {
    task: PeriodicTask,
}

impl RefreshSchedule {
    /// `None` when `period` is zero.
    pub fn start(service: Arc<DeviceService>, period: Duration) -> Option<Self> {
        if period.is_zero() {
            return None;
        }

        let task = PeriodicTask::start("refresh", period, move || {
            let service = Arc::clone(&service);
            async move {
                match service.refresh().await {
                    Ok(RefreshOutcome::Completed(_)) | Ok(RefreshOutcome::AlreadyRunning) => {}
                    Err(e) => tracing::warn!(error = %e, "scheduled refresh failed"),
                }
            }
        });
        Some(Self { task })
    }

    pub fn runs(&self) -> u64 {
        self.task.runs()
    }

    pub async fn stop(self) {
        self.task.stop().await
    }
}

/// Live display state polling.
pub struct StatePoller {
    task: PeriodicTask,
}

impl StatePoller {
    /// `None` when `period` is zero.
    pub fn start(service: Arc<DeviceService>, period: Duration) -> Option<Self> {
        if period.is_zero() {
            return None;
        }

        let task = PeriodicTask::start("state-poll", period, move || {
            let service = Arc::clone(&service);
            async move {
                if let Err(e) = service.poll_states().await {
                    tracing::warn!(error = %e, "state poll failed");
                }
            }
        });
        Some(Self { task })
    }

    pub fn runs(&self) -> u64 {
        self.task.runs()
    }

    pub async fn stop(self) {
        self.task.stop().await
    }
}
