// Refresh module for keeping the dashboard snapshot current.
// Builder, fallback loader, single-flight coordinator, and the periodic scheduler.

pub mod builder;
pub mod coordinator;
pub mod fallback;
pub mod scheduler;

pub use builder::{GitHubSnapshotBuilder, SnapshotBuilder};
pub use coordinator::{CacheStatus, RefreshCoordinator, RefreshStatus, Served};
pub use fallback::FallbackLoader;
pub use scheduler::RefreshScheduler;
