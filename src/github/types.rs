// GitHub API response types.
// Only the fields the dashboard shows are modelled; everything else in the response is ignored.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// Owner type discriminator (user or organization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OwnerType {
    #[default]
    User,
    Organization,
    Bot,
    #[serde(other)]
    Unknown,
}

/// Repository owner as embedded in repository responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub id: u64,
    pub login: String,
    #[serde(rename = "type", default)]
    pub owner_type: OwnerType,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Public profile of the dashboard subject (`GET /users/{login}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// GitHub repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

/// One week of commit counts (`GET /repos/{owner}/{repo}/stats/commit_activity`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyCommits {
    /// Start of the week (Sunday 00:00 UTC) as a unix timestamp.
    pub week: i64,
    pub total: u64,
    /// Commits per day, Sunday first.
    #[serde(default)]
    pub days: Vec<u64>,
}

/// Rate limit information from response headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Unix timestamp at which the window resets.
    pub reset: u64,
}

impl RateLimit {
    /// Parse the `x-ratelimit-*` headers. Returns `None` when GitHub sent none.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let header = |name: &str| -> Option<u64> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        };

        let remaining = header("x-ratelimit-remaining")?;
        Some(Self {
            limit: header("x-ratelimit-limit").unwrap_or_default(),
            remaining,
            reset: header("x-ratelimit-reset").unwrap_or_default(),
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.reset as i64, 0)
    }

    pub fn reset_display(&self) -> String {
        self.reset_at()
            .map(|dt| dt.format("%H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("60"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        let rate_limit = RateLimit::from_headers(&headers).unwrap();
        assert_eq!(rate_limit.limit, 60);
        assert!(rate_limit.is_exhausted());
        assert_eq!(rate_limit.reset_display(), "22:13:20 UTC");
    }

    #[test]
    fn test_rate_limit_absent_headers() {
        assert!(RateLimit::from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_repository_ignores_unknown_fields() {
        let json = r#"{
            "id": 1,
            "name": "jolt",
            "full_name": "phatblat/jolt",
            "owner": {"login": "phatblat", "type": "User", "site_admin": false},
            "html_url": "https://github.com/phatblat/jolt",
            "stargazers_count": 12,
            "pushed_at": "2024-05-01T10:00:00Z",
            "visibility": "public"
        }"#;

        let repo: Repository = serde_json::from_str(json).unwrap();
        assert_eq!(repo.full_name, "phatblat/jolt");
        assert_eq!(repo.owner.unwrap().login, "phatblat");
        assert_eq!(repo.stargazers_count, 12);
        assert!(repo.topics.is_empty());
        assert!(!repo.fork);
    }
}
