// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gatekeeping errors.
//!
//! Three layers:
//!
//! - [`AuthError`] - why a credential was not accepted
//! - [`RateLimitError`] - why a quota check refused the request
//! - [`GateError`] - the terminal outcome of [`Gatekeeper::admit`](super::Gatekeeper::admit)
//!
//! Only [`GateError`] is rendered to clients. Its body names the category
//! (`unauthenticated`, `forbidden`, `rate_limited`) and never the failing
//! check, so clients cannot tell an unknown principal from a bad signature.

use std::time::Duration;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::rate_limit::ceil_secs;

/// Authentication error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No credential presented
    #[error("no credential presented")]
    MissingCredentials,
    /// Credential present but not in a recognised scheme
    #[error("credential is not in a recognised scheme")]
    MalformedCredentials,
    /// Token signature or structure is invalid
    #[error("session token is invalid")]
    InvalidToken,
    /// Token has expired
    #[error("session token has expired")]
    TokenExpired,
    /// Token subject does not resolve to a principal
    #[error("principal not found")]
    PrincipalNotFound,
    /// Principal exists but is deactivated
    #[error("principal is inactive")]
    PrincipalInactive,
    /// API key matched no active principal
    #[error("API key is invalid")]
    InvalidApiKey,
    /// API key matched more than one principal
    #[error("API key matches more than one principal")]
    AmbiguousApiKey,
    /// Authenticated principal differs from the identity the request claimed
    #[error("credential does not belong to the claimed identity")]
    IdentityMismatch,
    /// Identity store or signing failure
    #[error("internal authentication error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::MalformedCredentials => "malformed_credentials",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::PrincipalNotFound => "principal_not_found",
            AuthError::PrincipalInactive => "principal_inactive",
            AuthError::InvalidApiKey => "invalid_api_key",
            AuthError::AmbiguousApiKey => "ambiguous_api_key",
            AuthError::IdentityMismatch => "identity_mismatch",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// True for failures caused by our own data or infrastructure rather
    /// than by the presented credential.
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::AmbiguousApiKey | AuthError::InternalError(_))
    }
}

/// Quota rejection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// Window quota used up; retry once `retry_after` has elapsed
    #[error("rate limit exceeded, retry in {}s", .retry_after.as_secs())]
    Exceeded { retry_after: Duration },
}

impl RateLimitError {
    /// Time until the current window resets.
    pub fn retry_after(&self) -> Duration {
        match self {
            RateLimitError::Exceeded { retry_after } => *retry_after,
        }
    }
}

/// Terminal admission failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(AuthError),
    #[error("rate limited: {0}")]
    RateLimited(RateLimitError),
    #[error("forbidden")]
    Forbidden,
}

impl From<AuthError> for GateError {
    fn from(err: AuthError) -> Self {
        GateError::Unauthenticated(err)
    }
}

impl From<RateLimitError> for GateError {
    fn from(err: RateLimitError) -> Self {
        GateError::RateLimited(err)
    }
}

#[derive(Serialize)]
struct GateErrorBody {
    error: &'static str,
    error_code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

impl GateError {
    /// Get the client-facing error code (category only).
    pub fn error_code(&self) -> &'static str {
        match self {
            GateError::Unauthenticated(inner) if inner.is_internal() => "internal_error",
            GateError::Unauthenticated(_) => "unauthenticated",
            GateError::RateLimited(_) => "rate_limited",
            GateError::Forbidden => "forbidden",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Unauthenticated(inner) if inner.is_internal() => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GateError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GateError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            GateError::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Seconds a client should wait before retrying, rounded up.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GateError::RateLimited(err) => Some(ceil_secs(err.retry_after()).max(1)),
            _ => None,
        }
    }

    fn public_message(&self) -> &'static str {
        match self.error_code() {
            "internal_error" => "Internal server error",
            "unauthenticated" => "Authentication required",
            "rate_limited" => "Rate limit exceeded",
            _ => "Insufficient permissions for this operation",
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after_secs = self.retry_after_secs();
        let body = Json(GateErrorBody {
            error: self.public_message(),
            error_code: self.error_code(),
            retry_after_secs,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after_secs {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unauthenticated_returns_401_without_detail() {
        let response = GateError::Unauthenticated(AuthError::PrincipalNotFound).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error_code"], "unauthenticated");
        assert!(!body.to_string().contains("principal"));
    }

    #[tokio::test]
    async fn bad_signature_and_unknown_principal_render_identically() {
        let a = body_json(GateError::Unauthenticated(AuthError::InvalidToken).into_response()).await;
        let b =
            body_json(GateError::Unauthenticated(AuthError::PrincipalNotFound).into_response()).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn forbidden_returns_403() {
        let response = GateError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() {
        let err = GateError::RateLimited(RateLimitError::Exceeded {
            retry_after: Duration::from_millis(90_500),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "91");

        let body = body_json(response).await;
        assert_eq!(body["retry_after_secs"], 91);
    }

    #[test]
    fn retry_after_is_at_least_one_second_and_saturates() {
        let short = GateError::RateLimited(RateLimitError::Exceeded {
            retry_after: Duration::from_millis(200),
        });
        assert_eq!(short.retry_after_secs(), Some(1));

        let unbounded = GateError::RateLimited(RateLimitError::Exceeded {
            retry_after: Duration::MAX,
        });
        assert_eq!(unbounded.retry_after_secs(), Some(u64::MAX));
        assert_eq!(GateError::Forbidden.retry_after_secs(), None);
    }

    #[tokio::test]
    async fn ambiguous_api_key_is_a_server_error() {
        let response = GateError::Unauthenticated(AuthError::AmbiguousApiKey).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error_code"], "internal_error");
    }

    #[test]
    fn auth_error_codes_are_stable() {
        assert_eq!(AuthError::TokenExpired.error_code(), "token_expired");
        assert_eq!(AuthError::InvalidApiKey.error_code(), "invalid_api_key");
        assert!(AuthError::InternalError("down".into()).is_internal());
        assert!(!AuthError::InvalidToken.is_internal());
    }
}
