// Periodic background refresh.
// Calls force_refresh on a fixed interval so readers rarely pay for a rebuild.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::coordinator::{CacheStatus, RefreshCoordinator};

/// Tracks consecutive failed ticks.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive: u32,
}

impl FailureTracker {
    const THRESHOLD: u32 = 3;

    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. Returns true once the threshold is reached.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive = self.consecutive.saturating_add(1);
        self.consecutive >= Self::THRESHOLD
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Handle to the background refresh task.
pub struct RefreshScheduler {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Start refreshing every `period`, first tick one period from now.
    ///
    /// A zero period disables the scheduler and returns `None`.
    pub fn spawn(coordinator: RefreshCoordinator, period: Duration) -> Option<Self> {
        if period.is_zero() {
            tracing::info!("scheduled refresh disabled");
            return None;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut failures = FailureTracker::new();

            tracing::info!(
                identity = coordinator.identity(),
                period_secs = period.as_secs(),
                "scheduled refresh started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => tick(&coordinator, &mut failures).await,
                    _ = shutdown_rx.recv() => break,
                }
            }

            tracing::info!(identity = coordinator.identity(), "scheduled refresh stopped");
        });

        Some(Self { shutdown_tx, task })
    }

    /// Stop the loop, waiting for a refresh in progress to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "scheduled refresh task failed");
        }
    }
}

async fn tick(coordinator: &RefreshCoordinator, failures: &mut FailureTracker) {
    let failure = match coordinator.force_refresh().await {
        Ok(served) if matches!(served.status, CacheStatus::Miss | CacheStatus::Refresh) => {
            if failures.consecutive() > 0 {
                tracing::info!(
                    identity = coordinator.identity(),
                    after_failures = failures.consecutive(),
                    "scheduled refresh recovered"
                );
            }
            failures.record_success();
            return;
        }
        Ok(served) => format!("upstream failed, serving {}", served.status),
        Err(err) => err.to_string(),
    };

    if failures.record_failure() {
        tracing::error!(
            identity = coordinator.identity(),
            consecutive = failures.consecutive(),
            error = %failure,
            "scheduled refresh keeps failing"
        );
    } else {
        tracing::warn!(
            identity = coordinator.identity(),
            error = %failure,
            "scheduled refresh failed"
        );
    }
}
