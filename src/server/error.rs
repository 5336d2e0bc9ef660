// HTTP rendering of service errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::Error;

/// Body of every failure response. Never carries a stack trace.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<&'static str>,
}

/// A service error on its way to becoming a response.
#[derive(Debug)]
pub struct ResponseError(Error);

impl ResponseError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ResponseError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::warn!(error = %self.0, "request rejected");
        }

        let body = ErrorBody {
            error: self.0.to_string(),
            remediation: self.0.remediation(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;

    #[test]
    fn test_status_codes() {
        let unavailable = ResponseError::from(Error::Unavailable {
            cause: UpstreamError::Timeout,
            fallback: "missing".to_string(),
        });
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);

        assert_eq!(
            ResponseError::from(Error::Unauthorized).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ResponseError::from(Error::Config("bad".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
