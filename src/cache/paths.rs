// Cache key and path utilities.
// Names the store key for an identity and the default location of the fallback snapshot.

use std::path::PathBuf;

use directories::ProjectDirs;

const KEY_PREFIX: &str = "dashboard:snapshot";

/// Get the base data directory (~/.local/share/dashboard-cache on Linux).
pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "dashboard-cache").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Default path of the pre-provisioned fallback snapshot.
pub fn default_fallback_path() -> PathBuf {
    data_dir()
        .map(|dir| dir.join("snapshot.json"))
        .unwrap_or_else(|| PathBuf::from("data").join("snapshot.json"))
}

/// Store key holding the snapshot for an identity.
///
/// GitHub logins are case-insensitive, so `Octocat` and `octocat` share a key.
pub fn snapshot_key(identity: &str) -> String {
    format!("{}:{}", KEY_PREFIX, sanitize_identity(identity))
}

/// Lowercase and strip characters that have no place in a login.
fn sanitize_identity(identity: &str) -> String {
    identity
        .trim()
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | '*' | '?' | ' ' => '_',
            _ => c.to_ascii_lowercase(),
        })
        .collect()
}
