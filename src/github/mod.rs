// GitHub API module.
// Provides the client and types the snapshot builder fetches with.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::{GITHUB_API_BASE, GitHubClient};
pub use types::*;
