// Cache store for reading and writing snapshots.
// One capability trait with a durable and an in-memory backend, chosen once at startup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StoreError;

use super::paths::snapshot_key;
use super::redis_store::RedisBackend;
use super::snapshot::Snapshot;

/// Raw key/value persistence. Values are complete serialized snapshots; a `set` replaces
/// the previous value in one step so readers never see a partial document.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short name for logs and the status endpoint.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// Process-local backend. Starts empty and is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// Snapshot persistence keyed by identity.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// In-memory store.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Select the backend from configuration: a connection string picks the durable
    /// store, its absence the in-memory one.
    pub fn open(store_url: Option<&str>, timeout: Duration) -> Result<Self, StoreError> {
        match store_url {
            Some(url) => {
                let backend = RedisBackend::new(url, timeout)?;
                Ok(Self::new(Arc::new(backend)))
            }
            None => Ok(Self::memory()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Read the snapshot for an identity.
    ///
    /// A stored value that no longer decodes is reported as absent.
    pub async fn read(&self, identity: &str) -> Result<Option<Snapshot>, StoreError> {
        let key = snapshot_key(identity);
        let Some(json) = self.backend.get(&key).await? else {
            return Ok(None);
        };

        match Snapshot::from_json(&json) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                tracing::warn!(%key, error = %err, "discarding undecodable cached snapshot");
                Ok(None)
            }
        }
    }

    /// Replace the snapshot for an identity.
    pub async fn write(&self, identity: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        let json = snapshot.to_json()?;
        self.backend.set(&snapshot_key(identity), json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::snapshot::{DashboardPayload, SnapshotSource};

    fn snapshot(login: &str) -> Snapshot {
        let mut payload = DashboardPayload::default();
        payload.profile.login = login.to_string();
        Snapshot::new("octocat", 30, SnapshotSource::Upstream, payload)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let store = CacheStore::memory();
        let data = snapshot("octocat");

        store.write("octocat", &data).await.unwrap();

        let read = store.read("octocat").await.unwrap();
        assert_eq!(read, Some(data));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let store = CacheStore::memory();
        assert!(store.read("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_replaces_previous() {
        let store = CacheStore::memory();
        store.write("octocat", &snapshot("first")).await.unwrap();
        store.write("octocat", &snapshot("second")).await.unwrap();

        let read = store.read("octocat").await.unwrap().unwrap();
        assert_eq!(read.payload.profile.login, "second");
    }

    #[tokio::test]
    async fn test_identity_key_is_case_insensitive() {
        let store = CacheStore::memory();
        store.write("OctoCat", &snapshot("octocat")).await.unwrap();
        assert!(store.read("octocat").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_undecodable_value_reads_as_absent() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .set(&snapshot_key("octocat"), "{not json".to_string())
            .await
            .unwrap();

        let store = CacheStore::new(backend);
        assert!(store.read("octocat").await.unwrap().is_none());
    }

    #[test]
    fn test_open_without_url_is_memory() {
        let store = CacheStore::open(None, Duration::from_secs(1)).unwrap();
        assert_eq!(store.backend_name(), "memory");
    }
}
