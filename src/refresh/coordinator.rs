// Refresh coordinator.
// Decides HIT vs refresh, deduplicates concurrent refreshes, and degrades through the stale and fallback tiers.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::{CacheStore, Snapshot, SnapshotSource};
use crate::error::{Error, Result, UpstreamError};
use crate::utils::CallOnDrop;

use super::builder::SnapshotBuilder;
use super::fallback::FallbackLoader;

/// How a served snapshot was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    /// Fresh snapshot straight from the store.
    Hit,
    /// Nothing was stored; built just now.
    Miss,
    /// An expired snapshot was replaced.
    Refresh,
    /// The refresh failed and an older snapshot was served instead.
    Stale,
    /// Upstream and store both came up empty; served the local fallback.
    Fallback,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Refresh => "REFRESH",
            CacheStatus::Stale => "STALE",
            CacheStatus::Fallback => "FALLBACK",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot handed to a caller, tagged with how it was obtained.
#[derive(Debug, Clone)]
pub struct Served {
    pub snapshot: Arc<Snapshot>,
    pub status: CacheStatus,
}

/// Result of one refresh task, shared by every caller that joined it.
#[derive(Debug, Clone)]
enum RefreshOutcome {
    Built(Arc<Snapshot>),
    Stale {
        cause: UpstreamError,
        snapshot: Arc<Snapshot>,
    },
    Fallback {
        cause: UpstreamError,
        snapshot: Arc<Snapshot>,
    },
    Exhausted {
        cause: UpstreamError,
        fallback: String,
    },
}

type RefreshChannel = Shared<oneshot::Receiver<RefreshOutcome>>;

/// Single-flight bookkeeping, guarded by one lock.
#[derive(Default)]
struct Flight {
    running: Option<RefreshChannel>,
    /// Number of refreshes that have finished.
    completed: u64,
    /// Outcome of the latest finished refresh.
    last: Option<RefreshOutcome>,
}

enum Claim {
    /// Another caller's refresh is running.
    Join(RefreshChannel),
    /// A refresh finished after this caller started looking; its outcome stands in.
    Finished(RefreshOutcome),
    /// This caller owns the new refresh and must spawn it.
    Start(RefreshChannel, oneshot::Sender<RefreshOutcome>),
}

/// Bookkeeping about past refreshes, for the status endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStatus {
    pub in_flight: bool,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct Inner {
    identity: String,
    ttl_minutes: u64,
    store: CacheStore,
    builder: Arc<dyn SnapshotBuilder>,
    fallback: FallbackLoader,
    flight: Mutex<Flight>,
    report: Mutex<RefreshStatus>,
}

/// Serves the dashboard snapshot for one identity.
///
/// Cloning is cheap and every clone shares the same in-flight refresh.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        identity: impl Into<String>,
        ttl_minutes: u64,
        store: CacheStore,
        builder: Arc<dyn SnapshotBuilder>,
        fallback: FallbackLoader,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                identity: identity.into(),
                ttl_minutes,
                store,
                builder,
                fallback,
                flight: Mutex::new(Flight::default()),
                report: Mutex::new(RefreshStatus::default()),
            }),
        }
    }

    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    pub fn ttl_minutes(&self) -> u64 {
        self.inner.ttl_minutes
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.store.backend_name()
    }

    /// Serve the snapshot, refreshing it first when it is missing or expired.
    pub async fn get(&self) -> Result<Served> {
        let seen = self.inner.completed();
        let prior = self.inner.read_store().await;

        if let Some(snapshot) = prior {
            if snapshot.is_fresh(Utc::now(), self.inner.ttl_minutes) {
                tracing::debug!(identity = %self.inner.identity, "serving cached snapshot");
                return Ok(Served {
                    snapshot: Arc::new(snapshot),
                    status: CacheStatus::Hit,
                });
            }
            tracing::debug!(identity = %self.inner.identity, "cached snapshot expired");
            let outcome = self.refresh(seen).await;
            return resolve(outcome, Some(Arc::new(snapshot)));
        }

        let outcome = self.refresh(seen).await;
        resolve(outcome, None)
    }

    /// Refresh regardless of freshness, joining a refresh that is already running.
    pub async fn force_refresh(&self) -> Result<Served> {
        let seen = self.inner.completed();
        let prior = self.inner.read_store().await.map(Arc::new);
        let outcome = self.refresh(seen).await;
        resolve(outcome, prior)
    }

    /// The stored snapshot, without refreshing anything.
    pub async fn peek(&self) -> Option<Snapshot> {
        self.inner.read_store().await
    }

    pub fn status(&self) -> RefreshStatus {
        let mut status = self.inner.report.lock().clone();
        status.in_flight = self.inner.flight.lock().running.is_some();
        status
    }

    /// Join the running refresh, reuse one that finished after `seen`, or start one.
    ///
    /// The refresh runs as its own task, so a caller going away does not cancel it.
    async fn refresh(&self, seen: u64) -> RefreshOutcome {
        let channel = match self.claim(seen) {
            Claim::Join(channel) => {
                tracing::debug!(identity = %self.inner.identity, "joining in-flight refresh");
                channel
            }
            Claim::Finished(outcome) => {
                tracing::debug!(identity = %self.inner.identity, "refresh finished during store read");
                return outcome;
            }
            Claim::Start(channel, sender) => {
                self.spawn_refresh(sender);
                channel
            }
        };

        match channel.await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(identity = %self.inner.identity, "refresh task ended without a result");
                let cause = UpstreamError::Aborted;
                self.inner.report.lock().last_error = Some(cause.to_string());
                self.inner.degrade(cause).await
            }
        }
    }

    fn claim(&self, seen: u64) -> Claim {
        let mut flight = self.inner.flight.lock();
        if let Some(channel) = flight.running.as_ref() {
            return Claim::Join(channel.clone());
        }
        if flight.completed > seen {
            if let Some(outcome) = flight.last.clone() {
                return Claim::Finished(outcome);
            }
        }

        let (sender, receiver) = oneshot::channel();
        let channel = receiver.shared();
        flight.running = Some(channel.clone());
        Claim::Start(channel, sender)
    }

    /// Run the claimed refresh. Must not be called with the flight lock held, since a
    /// task dropped on the spot clears the slot through that lock.
    fn spawn_refresh(&self, sender: oneshot::Sender<RefreshOutcome>) {
        let inner = self.inner.clone();
        let clear_running = CallOnDrop::new({
            let inner = self.inner.clone();
            move || {
                inner.flight.lock().running = None;
            }
        });

        tokio::spawn(async move {
            let outcome = inner.run_refresh().await;
            {
                let mut flight = inner.flight.lock();
                flight.completed += 1;
                flight.last = Some(outcome.clone());
            }
            // Recorded before the slot clears, so a later caller either joins, reuses
            // this outcome, or starts a new refresh.
            drop(clear_running);
            sender.send(outcome).ok();
        });
    }
}

impl Inner {
    fn completed(&self) -> u64 {
        self.flight.lock().completed
    }

    /// Store read where any backend failure counts as a miss.
    async fn read_store(&self) -> Option<Snapshot> {
        match self.store.read(&self.identity).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(
                    identity = %self.identity,
                    backend = self.store.backend_name(),
                    error = %err,
                    "cache read failed, treating as miss"
                );
                None
            }
        }
    }

    async fn write_store(&self, snapshot: &Snapshot) {
        if let Err(err) = self.store.write(&self.identity, snapshot).await {
            tracing::warn!(
                identity = %self.identity,
                backend = self.store.backend_name(),
                error = %err,
                "cache write failed, snapshot served but not stored"
            );
        }
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let started = Instant::now();
        self.report.lock().last_attempt_at = Some(Utc::now());

        match self.builder.build(&self.identity).await {
            Ok(payload) => {
                let snapshot = Snapshot::new(
                    &self.identity,
                    self.ttl_minutes,
                    SnapshotSource::Upstream,
                    payload,
                );
                self.write_store(&snapshot).await;

                {
                    let mut report = self.report.lock();
                    report.last_success_at = snapshot.meta.fetched_at;
                    report.last_error = None;
                }
                tracing::info!(
                    identity = %self.identity,
                    repositories = snapshot.payload.repositories.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "dashboard snapshot refreshed"
                );
                RefreshOutcome::Built(Arc::new(snapshot))
            }
            Err(cause) => {
                tracing::warn!(
                    identity = %self.identity,
                    status = ?cause.status(),
                    error = %cause,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "dashboard refresh failed"
                );
                self.report.lock().last_error = Some(cause.to_string());
                self.degrade(cause).await
            }
        }
    }

    /// Walk the lower tiers after a failed build: stored snapshot, then local fallback.
    async fn degrade(&self, cause: UpstreamError) -> RefreshOutcome {
        if let Some(snapshot) = self.read_store().await {
            return RefreshOutcome::Stale {
                cause,
                snapshot: Arc::new(snapshot),
            };
        }

        match self.fallback.load(&self.identity, self.ttl_minutes).await {
            Ok(snapshot) => {
                self.write_store(&snapshot).await;
                RefreshOutcome::Fallback {
                    cause,
                    snapshot: Arc::new(snapshot),
                }
            }
            Err(err) => {
                tracing::error!(
                    identity = %self.identity,
                    upstream = %cause,
                    fallback = %err,
                    "no dashboard data available"
                );
                RefreshOutcome::Exhausted {
                    cause,
                    fallback: err.to_string(),
                }
            }
        }
    }
}

/// Map a refresh outcome onto what this caller serves, given what it saw in the store.
fn resolve(outcome: RefreshOutcome, prior: Option<Arc<Snapshot>>) -> Result<Served> {
    let (snapshot, status) = match (outcome, prior) {
        (RefreshOutcome::Built(snapshot), Some(_)) => (snapshot, CacheStatus::Refresh),
        (RefreshOutcome::Built(snapshot), None) => (snapshot, CacheStatus::Miss),
        (RefreshOutcome::Stale { snapshot, .. }, _) => (snapshot, CacheStatus::Stale),
        (RefreshOutcome::Fallback { .. } | RefreshOutcome::Exhausted { .. }, Some(prior)) => {
            (prior, CacheStatus::Stale)
        }
        (RefreshOutcome::Fallback { snapshot, .. }, None) => (snapshot, CacheStatus::Fallback),
        (RefreshOutcome::Exhausted { cause, fallback }, None) => {
            return Err(Error::Unavailable { cause, fallback });
        }
    };
    Ok(Served { snapshot, status })
}
