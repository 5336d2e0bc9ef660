// Manual refresh credential check.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use crate::error::{Error, Result};

/// Alternate header carrying the refresh secret.
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// The secret a request presents, from `Authorization: Bearer` or `x-refresh-token`.
pub fn presented_secret(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim());

    bearer.or_else(|| {
        headers
            .get(REFRESH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
    })
}

/// Check the request against the configured secret. No secret configured means no check.
pub fn authorize(secret: Option<&str>, headers: &HeaderMap) -> Result<()> {
    let Some(secret) = secret else {
        return Ok(());
    };

    match presented_secret(headers) {
        Some(presented) if constant_time_eq(presented.as_bytes(), secret.as_bytes()) => Ok(()),
        _ => Err(Error::Unauthorized),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
