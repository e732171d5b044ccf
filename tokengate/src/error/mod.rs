//! Error types and error handling
//!
//! [`AuthError`] is the one error every handler and middleware returns. Its
//! [`IntoResponse`] impl picks the HTTP status and renders a small JSON body:
//!
//! ```json
//! {"error": "expired", "message": "token timed out"}
//! ```
//!
//! Whether a 401 is shown to a browser as a redirect to the login page is
//! decided later by [`crate::middleware::LoginRedirectLayer`], not here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Authentication error type
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential could not be parsed (bad header shape, bad encoding, short token)
    #[error("Malformed credential: {0}")]
    Malformed(String),

    /// Request parameters were invalid
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// OAuth client credentials were provisioned before
    #[error("OAuth already configured")]
    AlreadyConfigured,

    /// No identity attached where one is required
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Token decrypted but its validity window has passed
    #[error("token timed out")]
    Expired,

    /// Token failed authenticated decryption
    #[error("badly encrypted token")]
    Tampered,

    /// Identity provider call failed
    #[error("Identity provider error: {0}")]
    Upstream(String),

    /// A required secret has not been provisioned
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Durable storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Server error
    #[error("Server error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status for this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Malformed(_) | Self::BadRequest(_) | Self::AlreadyConfigured => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) | Self::Expired => StatusCode::UNAUTHORIZED,
            Self::Tampered => StatusCode::FORBIDDEN,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::NotConfigured(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable kind, used as the `error` field of the body
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::BadRequest(_) => "bad_request",
            Self::AlreadyConfigured => "already_configured",
            Self::Unauthorized(_) => "unauthorized",
            Self::Expired => "expired",
            Self::Tampered => "tampered",
            Self::Upstream(_) => "upstream",
            Self::NotConfigured(_) => "not_configured",
            Self::Storage(_) => "storage",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        } else {
            tracing::debug!(error = %self, kind = self.kind(), "request rejected");
        }

        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
