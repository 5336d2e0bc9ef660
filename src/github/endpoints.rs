// GitHub API endpoint functions.
// Typed fetches for the sub-resources that make up a dashboard snapshot.

use reqwest::StatusCode;

use crate::error::{UpstreamError, UpstreamResult};

use super::client::GitHubClient;
use super::types::{Profile, Repository, WeeklyCommits};

/// Largest page size the repository listing accepts.
const MAX_PER_PAGE: usize = 100;

impl GitHubClient {
    /// Get a user's public profile.
    pub async fn get_user(&self, login: &str) -> UpstreamResult<Profile> {
        let response = self.get(&format!("/users/{}", login)).await?;
        let profile: Profile = response.json().await?;
        Ok(profile)
    }

    /// Get one page of a user's public repositories, most recently pushed first.
    pub async fn get_user_repos(
        &self,
        login: &str,
        page: u32,
        per_page: u32,
    ) -> UpstreamResult<Vec<Repository>> {
        let params = [
            ("type", "owner"),
            ("sort", "pushed"),
            ("direction", "desc"),
            ("page", &page.to_string()),
            ("per_page", &per_page.to_string()),
        ];
        let response = self
            .get_with_params(&format!("/users/{}/repos", login), &params)
            .await?;
        let repos: Vec<Repository> = response.json().await?;
        Ok(repos)
    }

    /// Page through a user's repositories until exhausted or `max` have been collected.
    pub async fn get_all_user_repos(
        &self,
        login: &str,
        max: usize,
    ) -> UpstreamResult<Vec<Repository>> {
        let per_page = max.clamp(1, MAX_PER_PAGE);
        let mut repos = Vec::new();
        let mut page = 1;

        while repos.len() < max {
            let batch = self.get_user_repos(login, page, per_page as u32).await?;
            let last_page = batch.len() < per_page;
            repos.extend(batch);
            if last_page {
                break;
            }
            page += 1;
        }

        repos.truncate(max);
        Ok(repos)
    }

    /// Get the raw markdown of the profile README (`{login}/{login}/README.md`).
    ///
    /// A user without a profile README is not an error.
    pub async fn get_profile_readme(&self, login: &str) -> UpstreamResult<Option<String>> {
        match self
            .get_raw(&format!("/repos/{}/{}/readme", login, login))
            .await
        {
            Ok(response) => Ok(Some(response.text().await?)),
            Err(UpstreamError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Get the last year of weekly commit counts for a repository.
    ///
    /// GitHub answers `202 Accepted` while it computes the statistics and `204` for an empty
    /// repository; both yield an empty list.
    pub async fn get_commit_activity(&self, full_name: &str) -> UpstreamResult<Vec<WeeklyCommits>> {
        let response = self
            .get(&format!("/repos/{}/stats/commit_activity", full_name))
            .await?;
        match response.status() {
            StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Ok(Vec::new()),
            _ => {
                let weeks: Vec<WeeklyCommits> = response.json().await?;
                Ok(weeks)
            }
        }
    }
}
