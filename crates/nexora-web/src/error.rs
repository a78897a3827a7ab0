//! Mapping of engine errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nexora_auth_engine::AuthEngineError;
use serde_json::json;

/// An [`AuthEngineError`] returned from a bearer-authenticated route.
///
/// Rendered as `{"error": message}` with:
///
/// - `401` for [`AuthEngineError::Unauthorized`]
/// - `404` for [`AuthEngineError::ProviderNotFound`]
/// - `500` for everything else, including `NotConnected`
///
/// Routes whose contract has no `404` case build the error with
/// [`ApiError::server_error`] instead.
#[derive(Debug, thiserror::Error)]
#[error("{inner}")]
pub struct ApiError {
    inner: AuthEngineError,
    status: StatusCode,
}

impl From<AuthEngineError> for ApiError {
    fn from(inner: AuthEngineError) -> Self {
        let status = match &inner {
            AuthEngineError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AuthEngineError::ProviderNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { inner, status }
    }
}

impl ApiError {
    /// Report `inner` as a `500`, except for `401` which stays as is.
    pub fn server_error(inner: AuthEngineError) -> Self {
        match inner {
            AuthEngineError::Unauthorized { .. } => Self::from(inner),
            inner => Self {
                inner,
                status: StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.inner, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self.inner, "request rejected");
        }
        (status, Json(json!({ "error": self.inner.to_string() }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (
                AuthEngineError::Unauthorized {
                    reason: "missing".into(),
                },
                StatusCode::UNAUTHORIZED,
            ),
            (
                AuthEngineError::ProviderNotFound {
                    provider: "jira".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                AuthEngineError::NotConnected {
                    provider: "github".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AuthEngineError::ProjectFetchFailed {
                    provider: "github".into(),
                    reason: "Bad credentials".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn response_carries_status() {
        let response = ApiError::from(AuthEngineError::NotConnected {
            provider: "slack".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn server_error_downgrades_not_found() {
        let err = ApiError::server_error(AuthEngineError::ProviderNotFound {
            provider: "linear".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "provider not found: linear");

        let err = ApiError::server_error(AuthEngineError::Unauthorized {
            reason: "missing".into(),
        });
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
