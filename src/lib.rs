// dashboard-cache: serves a GitHub dashboard snapshot from a TTL cache.
// Refreshes are single-flight and degrade through stale, fallback, and unavailable tiers.

pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod logging;
pub mod refresh;
pub mod server;
pub mod utils;

pub use error::{Error, Result};
