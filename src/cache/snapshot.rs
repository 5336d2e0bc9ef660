// Dashboard snapshot, the single cached artifact per identity.
// Carries freshness metadata alongside the normalized GitHub payload.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::github::{Profile, Repository, WeeklyCommits};

/// Where a snapshot's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    #[default]
    Upstream,
    Fallback,
    #[serde(other)]
    Unknown,
}

/// Freshness metadata stored with every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub identity: String,
    /// When the snapshot was built. Missing or unparsable values read as `None`, which is never fresh.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: SnapshotSource,
    #[serde(default)]
    pub ttl_minutes: u64,
}

/// Normalized dashboard data. Opaque to the freshness logic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardPayload {
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub repositories: Vec<Repository>,
    #[serde(default)]
    pub readme: Option<String>,
    #[serde(default)]
    pub activity: Vec<WeeklyCommits>,
}

impl DashboardPayload {
    /// True when there is nothing worth serving.
    pub fn is_empty(&self) -> bool {
        self.profile.login.is_empty() && self.repositories.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    #[serde(default)]
    pub payload: DashboardPayload,
}

impl Snapshot {
    /// Stamp a payload built just now.
    pub fn new(
        identity: &str,
        ttl_minutes: u64,
        source: SnapshotSource,
        payload: DashboardPayload,
    ) -> Self {
        Self {
            meta: SnapshotMeta {
                identity: identity.to_string(),
                fetched_at: Some(Utc::now()),
                source,
                ttl_minutes,
            },
            payload,
        }
    }

    /// How long ago the snapshot was built.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.meta.fetched_at.map(|fetched_at| now - fetched_at)
    }

    /// `now - fetched_at <= ttl`. A snapshot without a usable timestamp is never fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl_minutes: u64) -> bool {
        let ttl = i64::try_from(ttl_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .unwrap_or(Duration::MAX);
        self.age(now).is_some_and(|age| age <= ttl)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}
