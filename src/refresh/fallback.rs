// Local fallback loader.
// Last tier: turns a pre-provisioned JSON file into a snapshot when GitHub and the cache both come up empty.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::cache::{DashboardPayload, Snapshot, SnapshotSource};
use crate::error::FallbackError;
use crate::github::Repository;

#[derive(Debug, Clone)]
pub struct FallbackLoader {
    path: PathBuf,
}

impl FallbackLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the fallback file as a snapshot stamped with the load time.
    ///
    /// Never produces an empty snapshot: a missing, unreadable, malformed, or empty
    /// file is an error.
    pub async fn load(&self, identity: &str, ttl_minutes: u64) -> Result<Snapshot, FallbackError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FallbackError::Missing(self.path.clone()));
            }
            Err(source) => {
                return Err(FallbackError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let payload = self.parse(&contents, identity)?;
        tracing::info!(
            path = %self.path.display(),
            repositories = payload.repositories.len(),
            "loaded fallback snapshot"
        );
        Ok(Snapshot::new(
            identity,
            ttl_minutes,
            SnapshotSource::Fallback,
            payload,
        ))
    }

    fn parse(&self, contents: &str, identity: &str) -> Result<DashboardPayload, FallbackError> {
        if contents.trim().is_empty() {
            return Err(FallbackError::Empty(self.path.clone()));
        }

        let malformed = |source| FallbackError::Malformed {
            path: self.path.clone(),
            source,
        };

        // Accepted shapes: a cached snapshot document (`{meta, payload}`), the raw
        // repository listing from GitHub, or a bare payload object.
        let document: Value = serde_json::from_str(contents).map_err(malformed)?;
        let mut payload = match document {
            Value::Array(items) => DashboardPayload {
                repositories: serde_json::from_value(Value::Array(items)).map_err(malformed)?,
                ..Default::default()
            },
            Value::Object(mut fields) if fields.contains_key("payload") => {
                let inner = fields.remove("payload").unwrap_or_default();
                serde_json::from_value(inner).map_err(malformed)?
            }
            other => serde_json::from_value(other).map_err(malformed)?,
        };

        if payload.is_empty() {
            return Err(FallbackError::Empty(self.path.clone()));
        }

        if payload.profile.login.is_empty() {
            payload.profile.login = display_identity(&payload.repositories, identity);
        }
        Ok(payload)
    }
}

/// Who the data belongs to: the owner embedded in the first repository, else the configured identity.
fn display_identity(repositories: &[Repository], configured: &str) -> String {
    repositories
        .first()
        .and_then(|repo| repo.owner.as_ref())
        .map(|owner| owner.login.clone())
        .filter(|login| !login.is_empty())
        .unwrap_or_else(|| configured.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;

    fn loader_with(contents: &str) -> (FallbackLoader, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        std::fs::write(&path, contents).unwrap();
        (FallbackLoader::new(path), temp_dir)
    }

    #[tokio::test]
    async fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let loader = FallbackLoader::new(temp_dir.path().join("absent.json"));

        let err = loader.load("octocat", 30).await.unwrap_err();
        assert!(matches!(err, FallbackError::Missing(_)));
    }

    #[tokio::test]
    async fn test_empty_and_malformed_files() {
        let (loader, _dir) = loader_with("  \n");
        assert!(matches!(
            loader.load("octocat", 30).await.unwrap_err(),
            FallbackError::Empty(_)
        ));

        let (loader, _dir) = loader_with("{\"profile\": ");
        assert!(matches!(
            loader.load("octocat", 30).await.unwrap_err(),
            FallbackError::Malformed { .. }
        ));

        let (loader, _dir) = loader_with("[]");
        assert!(matches!(
            loader.load("octocat", 30).await.unwrap_err(),
            FallbackError::Empty(_)
        ));

        let (loader, _dir) = loader_with("{}");
        assert!(matches!(
            loader.load("octocat", 30).await.unwrap_err(),
            FallbackError::Empty(_)
        ));
    }

    #[tokio::test]
    async fn test_repository_list_infers_owner() {
        let (loader, _dir) = loader_with(
            r#"[
                {"name": "jolt", "full_name": "phatblat/jolt", "owner": {"login": "phatblat"}},
                {"name": "dotfiles", "full_name": "phatblat/dotfiles"}
            ]"#,
        );

        let before = Utc::now();
        let snapshot = loader.load("octocat", 30).await.unwrap();

        assert_eq!(snapshot.meta.identity, "octocat");
        assert_eq!(snapshot.meta.source, SnapshotSource::Fallback);
        assert!(snapshot.meta.fetched_at.unwrap() >= before);
        assert_eq!(snapshot.payload.profile.login, "phatblat");
        assert_eq!(snapshot.payload.repositories.len(), 2);
    }

    #[tokio::test]
    async fn test_repository_list_without_owner_uses_configured_identity() {
        let (loader, _dir) = loader_with(r#"[{"name": "a", "full_name": "x/a"}]"#);

        let snapshot = loader.load("octocat", 30).await.unwrap();
        assert_eq!(snapshot.payload.profile.login, "octocat");
    }

    #[tokio::test]
    async fn test_snapshot_document_gets_fresh_timestamp() {
        let (loader, _dir) = loader_with(
            r#"{
                "meta": {"identity": "octocat", "fetched_at": "2020-01-01T00:00:00Z", "ttl_minutes": 30},
                "payload": {"profile": {"login": "octocat", "followers": 3}, "readme": "hi"}
            }"#,
        );

        let snapshot = loader.load("octocat", 45).await.unwrap();
        let fetched_at = snapshot.meta.fetched_at.unwrap();

        assert!(Utc::now() - fetched_at < chrono::Duration::minutes(1));
        assert_eq!(snapshot.meta.ttl_minutes, 45);
        assert_eq!(snapshot.payload.profile.followers, 3);
        assert_eq!(snapshot.payload.readme.as_deref(), Some("hi"));
    }
}
