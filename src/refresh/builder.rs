// Snapshot builder.
// Fetches every sub-resource of a dashboard from GitHub as one unit of work.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use futures::future::join_all;

use crate::cache::DashboardPayload;
use crate::error::UpstreamResult;
use crate::github::{GitHubClient, Repository, WeeklyCommits};

/// Weeks of history GitHub's commit activity statistics cover.
const ACTIVITY_WEEKS: i64 = 52;

/// Produces a complete dashboard payload for an identity, or fails as a whole.
#[async_trait]
pub trait SnapshotBuilder: Send + Sync {
    async fn build(&self, identity: &str) -> UpstreamResult<DashboardPayload>;
}

/// Builds payloads from the GitHub REST API.
pub struct GitHubSnapshotBuilder {
    client: GitHubClient,
    /// Cap on listed repositories.
    max_repos: usize,
    /// How many recently pushed repositories feed the activity history.
    activity_repos: usize,
}

impl GitHubSnapshotBuilder {
    pub fn new(client: GitHubClient, max_repos: usize, activity_repos: usize) -> Self {
        Self {
            client,
            max_repos,
            activity_repos,
        }
    }

    /// Weekly commit totals across the most recently pushed repositories.
    ///
    /// Never fails: a repository whose statistics can't be fetched contributes zeros.
    async fn fetch_activity(&self, repositories: &[Repository]) -> Vec<WeeklyCommits> {
        let mut weeks = empty_activity(Utc::now());

        let fetches = activity_sources(repositories, self.activity_repos)
            .into_iter()
            .map(|repo| async move {
                let result = self.client.get_commit_activity(&repo.full_name).await;
                (repo, result)
            });

        for (repo, result) in join_all(fetches).await {
            match result {
                Ok(repo_weeks) => merge_activity(&mut weeks, &repo_weeks),
                Err(err) => {
                    tracing::warn!(
                        repo = %repo.full_name,
                        error = %err,
                        "commit activity unavailable, using zeros"
                    );
                }
            }
        }

        weeks
    }
}

#[async_trait]
impl SnapshotBuilder for GitHubSnapshotBuilder {
    async fn build(&self, identity: &str) -> UpstreamResult<DashboardPayload> {
        let (profile, repositories, readme) = tokio::try_join!(
            self.client.get_user(identity),
            self.client.get_all_user_repos(identity, self.max_repos),
            self.client.get_profile_readme(identity),
        )?;

        let activity = self.fetch_activity(&repositories).await;

        tracing::debug!(
            %identity,
            repositories = repositories.len(),
            has_readme = readme.is_some(),
            rate_limit_remaining = self.client.rate_limit().map(|r| r.remaining),
            "built dashboard payload"
        );

        Ok(DashboardPayload {
            profile,
            repositories,
            readme,
            activity,
        })
    }
}

/// Non-fork, non-archived repositories, most recently pushed first.
fn activity_sources(repositories: &[Repository], limit: usize) -> Vec<&Repository> {
    let mut sources: Vec<&Repository> = repositories
        .iter()
        .filter(|repo| !repo.fork && !repo.archived)
        .collect();
    sources.sort_by(|a, b| b.pushed_at.cmp(&a.pushed_at));
    sources.truncate(limit);
    sources
}

/// Zero-filled history of the last 52 weeks, each starting Sunday 00:00 UTC like GitHub's.
fn empty_activity(now: DateTime<Utc>) -> Vec<WeeklyCommits> {
    let today = now.date_naive();
    let sunday = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
    let current_week = sunday
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default();

    (0..ACTIVITY_WEEKS)
        .rev()
        .map(|offset| WeeklyCommits {
            week: current_week - offset * Duration::weeks(1).num_seconds(),
            total: 0,
            days: vec![0; 7],
        })
        .collect()
}

/// Add one repository's weeks onto the aggregate, matching on week start.
fn merge_activity(aggregate: &mut [WeeklyCommits], weeks: &[WeeklyCommits]) {
    for week in weeks {
        let Some(slot) = aggregate.iter_mut().find(|slot| slot.week == week.week) else {
            continue;
        };
        slot.total += week.total;
        for (total, day) in slot.days.iter_mut().zip(&week.days) {
            *total += day;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::TimeZone;

    use super::*;

    fn repo(name: &str, pushed_days_ago: i64, fork: bool) -> Repository {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "full_name": format!("octocat/{name}"),
            "html_url": format!("https://github.com/octocat/{name}"),
            "fork": fork,
            "pushed_at": (Utc::now() - Duration::days(pushed_days_ago)).to_rfc3339(),
        }))
        .unwrap()
    }

    #[test]
    fn test_empty_activity_is_52_sundays() {
        // Wednesday
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 15, 30, 0).unwrap();
        let weeks = empty_activity(now);

        assert_eq!(weeks.len(), 52);
        let last = Utc.timestamp_opt(weeks[51].week, 0).unwrap();
        assert_eq!(last, Utc.with_ymd_and_hms(2024, 4, 28, 0, 0, 0).unwrap());
        assert_eq!(weeks[51].week - weeks[50].week, 7 * 24 * 3600);
        assert!(weeks.iter().all(|w| w.total == 0 && w.days == vec![0; 7]));
    }

    #[test]
    fn test_merge_activity_sums_matching_weeks() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut aggregate = empty_activity(now);
        let current = aggregate[51].week;

        let repo_weeks = vec![
            WeeklyCommits {
                week: current,
                total: 3,
                days: vec![0, 1, 2, 0, 0, 0, 0],
            },
            // Outside the window, ignored.
            WeeklyCommits {
                week: 0,
                total: 99,
                days: vec![99, 0, 0, 0, 0, 0, 0],
            },
        ];
        merge_activity(&mut aggregate, &repo_weeks);
        merge_activity(&mut aggregate, &repo_weeks);

        assert_eq!(aggregate[51].total, 6);
        assert_eq!(aggregate[51].days, vec![0, 2, 4, 0, 0, 0, 0]);
        assert_eq!(aggregate.iter().map(|w| w.total).sum::<u64>(), 6);
    }

    #[test]
    fn test_activity_sources_skip_forks_and_order_by_push() {
        let repos = vec![
            repo("old", 30, false),
            repo("forked", 1, true),
            repo("recent", 2, false),
            repo("middle", 10, false),
        ];

        let names: Vec<&str> = activity_sources(&repos, 2)
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["recent", "middle"]);
    }

    fn builder_for(server: &mockito::Server) -> GitHubSnapshotBuilder {
        let client = GitHubClient::new(&server.url(), None, StdDuration::from_secs(5)).unwrap();
        GitHubSnapshotBuilder::new(client, 10, 2)
    }

    #[tokio::test]
    async fn test_build_collects_all_sub_resources() {
        let mut server = mockito::Server::new_async().await;
        let _user = server
            .mock("GET", "/users/octocat")
            .with_status(200)
            .with_body(r#"{"login":"octocat","name":"The Octocat","followers":10}"#)
            .create_async()
            .await;
        let _repos = server
            .mock("GET", "/users/octocat/repos")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                serde_json::to_string(&serde_json::json!([
                    {"name": "a", "full_name": "octocat/a", "html_url": "x"},
                ]))
                .unwrap(),
            )
            .create_async()
            .await;
        let _readme = server
            .mock("GET", "/repos/octocat/octocat/readme")
            .with_status(200)
            .with_body("# Hello")
            .create_async()
            .await;
        let _activity = server
            .mock("GET", "/repos/octocat/a/stats/commit_activity")
            .with_status(500)
            .create_async()
            .await;

        let payload = builder_for(&server).build("octocat").await.unwrap();

        assert_eq!(payload.profile.name.as_deref(), Some("The Octocat"));
        assert_eq!(payload.repositories.len(), 1);
        assert_eq!(payload.readme.as_deref(), Some("# Hello"));
        // Activity failure degrades to a zero-filled year instead of failing the build.
        assert_eq!(payload.activity.len(), 52);
        assert!(payload.activity.iter().all(|w| w.total == 0));
    }

    #[tokio::test]
    async fn test_build_fails_when_required_fetch_fails() {
        let mut server = mockito::Server::new_async().await;
        let _user = server
            .mock("GET", "/users/octocat")
            .with_status(403)
            .with_header("x-ratelimit-limit", "60")
            .with_header("x-ratelimit-remaining", "0")
            .with_header("x-ratelimit-reset", "1700000000")
            .create_async()
            .await;
        let _repos = server
            .mock("GET", "/users/octocat/repos")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let _readme = server
            .mock("GET", "/repos/octocat/octocat/readme")
            .with_status(404)
            .create_async()
            .await;

        let err = builder_for(&server).build("octocat").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.rate_limit().map(|r| r.limit), Some(60));
    }
}
