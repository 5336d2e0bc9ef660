// Cache module for snapshot persistence.
// Holds the snapshot model, the backend-agnostic store, and key/path helpers.

pub mod paths;
pub mod redis_store;
pub mod snapshot;
pub mod store;

pub use paths::{default_fallback_path, snapshot_key};
pub use redis_store::RedisBackend;
pub use snapshot::{DashboardPayload, Snapshot, SnapshotMeta, SnapshotSource};
pub use store::{CacheBackend, CacheStore, MemoryBackend};
