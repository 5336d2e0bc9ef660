// Service configuration.
// Command-line flags with environment fallbacks, parsed once at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::cache::default_fallback_path;
use crate::error::{Error, Result};
use crate::github::GITHUB_API_BASE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "dashboard-cache", version)]
#[command(about = "Serves a GitHub dashboard snapshot from a TTL cache with single-flight refresh")]
pub struct Config {
    /// GitHub login whose dashboard is served
    #[arg(long, env = "DASHBOARD_IDENTITY")]
    pub identity: String,

    /// Minutes a snapshot stays fresh
    #[arg(long, env = "DASHBOARD_TTL_MINUTES", default_value_t = 30)]
    pub ttl_minutes: u64,

    /// Minutes between scheduled refreshes (0 disables)
    #[arg(long, env = "DASHBOARD_REFRESH_INTERVAL_MINUTES", default_value_t = 15)]
    pub refresh_interval_minutes: u64,

    /// Shared secret required by the manual refresh endpoint
    #[arg(long, env = "DASHBOARD_REFRESH_SECRET", hide_env_values = true)]
    pub refresh_secret: Option<String>,

    /// Durable store connection string (redis://...); in-memory when unset
    #[arg(long, env = "DASHBOARD_STORE_URL", hide_env_values = true)]
    pub store_url: Option<String>,

    /// Pre-provisioned snapshot used when GitHub and the store are both empty
    #[arg(long, env = "DASHBOARD_FALLBACK_PATH")]
    pub fallback_path: Option<PathBuf>,

    /// GitHub token; anonymous requests when unset
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", default_value = GITHUB_API_BASE)]
    pub github_api_url: String,

    /// Timeout for each GitHub request and durable store call
    #[arg(long, env = "DASHBOARD_UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Most repositories listed on the dashboard
    #[arg(long, env = "DASHBOARD_MAX_REPOS", default_value_t = 100)]
    pub max_repos: usize,

    /// Recently pushed repositories that feed the activity history
    #[arg(long, env = "DASHBOARD_ACTIVITY_REPOS", default_value_t = 5)]
    pub activity_repos: usize,

    #[arg(long, env = "DASHBOARD_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    #[arg(long, env = "DASHBOARD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    /// Reject values that parse but can't run.
    pub fn validate(&self) -> Result<()> {
        if self.identity.trim().is_empty() {
            return Err(Error::Config("identity must not be empty".to_string()));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(Error::Config(
                "upstream timeout must be at least one second".to_string(),
            ));
        }
        if self.max_repos == 0 {
            return Err(Error::Config("max repos must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn identity(&self) -> &str {
        self.identity.trim()
    }

    /// An empty secret counts as unset.
    pub fn refresh_secret(&self) -> Option<&str> {
        non_empty(self.refresh_secret.as_deref())
    }

    pub fn github_token(&self) -> Option<&str> {
        non_empty(self.github_token.as_deref())
    }

    pub fn store_url(&self) -> Option<&str> {
        non_empty(self.store_url.as_deref())
    }

    pub fn fallback_path(&self) -> PathBuf {
        self.fallback_path.clone().unwrap_or_else(default_fallback_path)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
