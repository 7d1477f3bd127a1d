// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors backed by the [`Gatekeeper`](super::Gatekeeper).
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(principal): Auth) -> impl IntoResponse {
//!     // principal is the verified Principal
//! }
//! ```
//!
//! Handlers that need the JSON body or a rate limit take a [`GateContext`]
//! and call [`Gatekeeper::admit`](super::Gatekeeper::admit) themselves.
//! Routes that accept a body and authenticate through `Auth` sit behind
//! [`require_principal`](super::require_principal), which reads the body
//! first; otherwise a body announced in the headers disables bypass.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Query, RawPathParams},
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH, TRANSFER_ENCODING},
        request::Parts,
    },
};

use super::{GateError, Principal, RequestContext, Role};
use crate::state::AppState;

/// Transport view of the request, built from headers, query, path
/// parameters and the peer address.
#[derive(Debug, Clone)]
pub struct GateContext(pub RequestContext);

impl FromRequestParts<AppState> for GateContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let mut ctx = RequestContext::new();

        // Non-UTF-8 header values are treated as absent.
        if let Some(value) = header_str(parts, AUTHORIZATION.as_str()) {
            ctx = ctx.with_authorization(value);
        }
        if let Some(value) = header_str(parts, &state.config.api_key_header) {
            ctx = ctx.with_api_key_header(value);
        }

        if let Ok(Query(query)) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
            ctx = ctx.with_query_map(query);
        }

        if let Ok(params) = RawPathParams::from_request_parts(parts, state).await {
            for (name, value) in &params {
                ctx = ctx.with_path_param(name, value);
            }
        }

        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            ctx = ctx.with_source_addr(addr.ip());
        }

        if announces_body(parts) {
            ctx = ctx.with_uninspected_body();
        }

        Ok(GateContext(ctx))
    }
}

fn header_str(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn announces_body(parts: &Parts) -> bool {
    if parts.headers.contains_key(TRANSFER_ENCODING) {
        return true;
    }
    header_str(parts, CONTENT_LENGTH.as_str())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .is_some_and(|length| length > 0)
}

/// Extractor for authenticated principals.
///
/// Runs bypass and credential verification; no quota and no role
/// requirement. The admitted principal is cached in the request extensions
/// so stacked extractors do not verify twice.
pub struct Auth(pub Principal);

impl FromRequestParts<AppState> for Auth {
    type Rejection = GateError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>().cloned() {
            return Ok(Auth(principal));
        }

        let Ok(GateContext(ctx)) = GateContext::from_request_parts(parts, state).await;
        let principal = state.gatekeeper.admit(&ctx, None, None).await?;
        parts.extensions.insert(principal.clone());
        Ok(Auth(principal))
    }
}

/// Extractor that requires a minimum role, given as its rank.
///
/// # Example
///
/// ```rust,ignore
/// async fn supervisors(
///     RequireRole(principal): RequireRole<{ Role::Supervisor as u8 }>,
/// ) -> impl IntoResponse {
///     // supervisors, managers and admins reach here
/// }
/// ```
pub struct RequireRole<const R: u8>(pub Principal);

impl<const R: u8> FromRequestParts<AppState> for RequireRole<R> {
    type Rejection = GateError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Auth(principal) = Auth::from_request_parts(parts, state).await?;

        // Unknown ranks fall back to the highest requirement.
        let required = Role::from_rank(R).unwrap_or(Role::Admin);
        if !principal.has_role(required) {
            tracing::debug!(
                principal_id = %principal.id,
                required = %required,
                "insufficient role"
            );
            return Err(GateError::Forbidden);
        }

        Ok(RequireRole(principal))
    }
}

/// Extractor that requires admin role.
pub struct AdminOnly(pub Principal);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = GateError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireRole(principal) =
            RequireRole::<{ Role::Admin as u8 }>::from_request_parts(parts, state).await?;
        Ok(AdminOnly(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, BypassRule};
    use crate::config::GatekeeperConfig;
    use axum::http::Request;

    async fn create_test_state() -> AppState {
        let state = AppState::new(GatekeeperConfig::new("test-secret"));
        state
            .directory
            .insert(Principal::new("user_123", Role::User).with_api_key("sk_user"))
            .await
            .unwrap();
        state
            .directory
            .insert(Principal::new("admin_1", Role::Admin).with_api_key("sk_admin"))
            .await
            .unwrap();
        state
    }

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_credentials() {
        let state = create_test_state().await;
        let mut parts = parts(Request::builder().uri("/test"));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(
            result,
            Err(GateError::Unauthenticated(AuthError::MissingCredentials))
        ));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_session_token() {
        let state = create_test_state().await;
        let token = state
            .tokens
            .issue(&Principal::new("user_123", Role::User))
            .unwrap();
        let mut parts = parts(
            Request::builder()
                .uri("/test")
                .header("Authorization", format!("Bearer {token}")),
        );

        let Auth(principal) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(principal.id, "user_123");
        assert!(parts.extensions.get::<Principal>().is_some());
    }

    #[tokio::test]
    async fn auth_extractor_reads_configured_api_key_header() {
        let state = create_test_state().await;
        let mut parts = parts(Request::builder().uri("/test").header("x-api-key", "sk_user"));

        let Auth(principal) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(principal.id, "user_123");
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let state = create_test_state().await;
        let mut parts = parts(Request::builder().uri("/test"));
        parts
            .extensions
            .insert(Principal::new("from_extensions", Role::Manager));

        let Auth(principal) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(principal.id, "from_extensions");
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let state = create_test_state().await;
        let mut parts = parts(Request::builder().uri("/test").header("x-api-key", "sk_user"));

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(GateError::Forbidden)));
    }

    #[tokio::test]
    async fn require_role_admits_higher_roles() {
        let state = create_test_state().await;
        let mut parts = parts(Request::builder().uri("/test").header("x-api-key", "sk_admin"));

        let result =
            RequireRole::<{ Role::Supervisor as u8 }>::from_request_parts(&mut parts, &state).await;
        assert_eq!(result.unwrap().0.id, "admin_1");
    }

    #[tokio::test]
    async fn gate_context_collects_query_and_headers() {
        let state = create_test_state().await;
        let mut parts = parts(
            Request::builder()
                .uri("/test?user=svc&page=2")
                .header("Authorization", "Bearer s1"),
        );

        let Ok(GateContext(ctx)) = GateContext::from_request_parts(&mut parts, &state).await;
        assert_eq!(ctx.claimed_principal(), Some("svc"));
        assert_eq!(ctx.authorization_secret(), Some("s1"));
        assert_eq!(ctx.source_addr(), None);
    }

    #[tokio::test]
    async fn announced_body_disables_bypass_for_extractors() {
        let config = GatekeeperConfig::new("test-secret")
            .with_bypass(BypassRule::new("ops", "sec").with_role(Role::Admin));
        let state = AppState::new(config);

        let mut with_body = parts(
            Request::builder()
                .uri("/test?user=ops")
                .header("Authorization", "Bearer sec")
                .header("Content-Length", "24"),
        );
        let result = Auth::from_request_parts(&mut with_body, &state).await;
        assert!(matches!(result, Err(GateError::Unauthenticated(_))));

        let mut empty_body = parts(
            Request::builder()
                .uri("/test?user=ops")
                .header("Authorization", "Bearer sec")
                .header("Content-Length", "0"),
        );
        let Auth(principal) = Auth::from_request_parts(&mut empty_body, &state)
            .await
            .unwrap();
        assert_eq!(principal.id, "ops");
    }
}
