// GitHub API HTTP client.
// Handles authentication, per-request timeouts, rate limit tracking, and status mapping.

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};

use crate::error::{UpstreamError, UpstreamResult};

use super::types::RateLimit;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";

/// GitHub API client with optional authentication and rate limit tracking.
///
/// Safe to share between concurrent sub-fetches; the last seen rate limit is kept behind a lock.
pub struct GitHubClient {
    client: Client,
    base_url: String,
    rate_limit: Mutex<Option<RateLimit>>,
}

impl GitHubClient {
    /// Create a client against `base_url`. Without a token requests are anonymous
    /// and subject to GitHub's much lower unauthenticated rate limit.
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> UpstreamResult<Self> {
        let mut headers = HeaderMap::new();

        if let Some(token) = token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| UpstreamError::Request(e.to_string()))?,
            );
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("dashboard-cache"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limit: Mutex::new(None),
        })
    }

    /// Rate limit reported by the most recent response, if any.
    pub fn rate_limit(&self) -> Option<RateLimit> {
        *self.rate_limit.lock()
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Make a GET request to the GitHub API.
    pub async fn get(&self, endpoint: &str) -> UpstreamResult<Response> {
        let response = self.client.get(self.url(endpoint)).send().await?;
        self.check_response(response).await
    }

    /// Make a GET request with query parameters.
    pub async fn get_with_params<T: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        params: &T,
    ) -> UpstreamResult<Response> {
        let response = self
            .client
            .get(self.url(endpoint))
            .query(params)
            .send()
            .await?;
        self.check_response(response).await
    }

    /// Make a GET request asking for the raw file body instead of the JSON envelope.
    pub async fn get_raw(&self, endpoint: &str) -> UpstreamResult<Response> {
        let response = self
            .client
            .get(self.url(endpoint))
            .header(ACCEPT, RAW_MEDIA_TYPE)
            .send()
            .await?;
        self.check_response(response).await
    }

    /// Record rate limit headers and convert error statuses.
    async fn check_response(&self, response: Response) -> UpstreamResult<Response> {
        let rate_limit = RateLimit::from_headers(response.headers());
        if let Some(rate_limit) = rate_limit {
            *self.rate_limit.lock() = Some(rate_limit);
        }

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(UpstreamError::Unauthorized),
            StatusCode::NOT_FOUND => Err(UpstreamError::NotFound(response.url().path().to_string())),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
                if status == StatusCode::TOO_MANY_REQUESTS
                    || rate_limit.is_some_and(|r| r.is_exhausted()) =>
            {
                tracing::warn!(
                    status = status.as_u16(),
                    reset = rate_limit.map(|r| r.reset),
                    "GitHub rate limit exhausted"
                );
                Err(UpstreamError::RateLimited {
                    status: status.as_u16(),
                    rate_limit: rate_limit.unwrap_or_default(),
                })
            }
            status => Err(UpstreamError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
                rate_limit,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::Server) -> GitHubClient {
        GitHubClient::new(&server.url(), Some("test-token"), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_sends_auth_and_tracks_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users/octocat")
            .match_header("authorization", "Bearer test-token")
            .match_header("x-github-api-version", GITHUB_API_VERSION)
            .with_status(200)
            .with_header("x-ratelimit-limit", "5000")
            .with_header("x-ratelimit-remaining", "4999")
            .with_header("x-ratelimit-reset", "1700000000")
            .with_body(r#"{"login":"octocat"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        client.get("/users/octocat").await.unwrap();

        let rate_limit = client.rate_limit().unwrap();
        assert_eq!(rate_limit.limit, 5000);
        assert_eq!(rate_limit.remaining, 4999);
    }

    #[tokio::test]
    async fn test_forbidden_with_exhausted_limit_is_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users/octocat")
            .with_status(403)
            .with_header("x-ratelimit-limit", "60")
            .with_header("x-ratelimit-remaining", "0")
            .with_header("x-ratelimit-reset", "1700000000")
            .with_body(r#"{"message":"API rate limit exceeded"}"#)
            .create_async()
            .await;

        let err = client_for(&server).get("/users/octocat").await.unwrap_err();
        match err {
            UpstreamError::RateLimited { status, rate_limit } => {
                assert_eq!(status, 403);
                assert_eq!(rate_limit.limit, 60);
                assert_eq!(rate_limit.reset, 1_700_000_000);
            }
            other => panic!("expected rate limit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_forbidden_with_remaining_quota_is_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/users/octocat")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "10")
            .with_body("forbidden")
            .create_async()
            .await;

        let err = client_for(&server).get("/users/octocat").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(matches!(err, UpstreamError::Http { .. }));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let mut server = mockito::Server::new_async().await;
        let _a = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;
        let _b = server
            .mock("GET", "/private")
            .with_status(401)
            .create_async()
            .await;
        let _c = server
            .mock("GET", "/broken")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.get("/missing").await.unwrap_err(),
            UpstreamError::NotFound(_)
        ));
        assert_eq!(
            client.get("/private").await.unwrap_err(),
            UpstreamError::Unauthorized
        );
        let err = client.get("/broken").await.unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let client =
            GitHubClient::new("http://127.0.0.1:1", None, Duration::from_millis(500)).unwrap();
        let err = client.get("/users/octocat").await.unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::Request(_) | UpstreamError::Timeout
        ));
        assert_eq!(err.status(), None);
    }
}
