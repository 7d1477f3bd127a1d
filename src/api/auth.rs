// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session issuance.
//!
//! The caller authenticates with an API key (or a still-valid session token)
//! and names the email it logs in as. Attempts are throttled per attempted
//! identity before the credential is checked.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{context::normalize_identity, AuthError, GateContext, PrincipalSummary},
    error::ApiError,
    state::{actions, AppState},
};

/// Request body for POST /v1/auth/session
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateSessionRequest {
    /// Email of the principal logging in
    pub email: String,
    /// Principal the caller claims to act as (operational callers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Response for POST /v1/auth/session
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// HS256 session token
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
    pub principal: PrincipalSummary,
}

/// Exchange a credential for a session token.
#[utoipa::path(
    post,
    path = "/v1/auth/session",
    tag = "Auth",
    security(("api_key" = []), ("bearer_auth" = [])),
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Not authenticated, or email does not match the credential"),
        (status = 429, description = "Too many login attempts")
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    GateContext(ctx): GateContext,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let ctx = ctx
        .with_body(serde_json::json!({ "user": request.user }))
        .with_attempted_identity(request.email.as_str());
    let required = state.policy.required_role(actions::SESSION_CREATE);
    let principal = state
        .gatekeeper
        .admit(&ctx, Some(required), Some(&state.config.rate_limits.login))
        .await?;

    let attempted = normalize_identity(&request.email);
    let matches = principal
        .email
        .as_deref()
        .is_some_and(|email| normalize_identity(email) == attempted);
    if !matches {
        tracing::debug!(principal_id = %principal.id, "session email does not match credential");
        return Err(AuthError::IdentityMismatch.into());
    }

    let access_token = state.tokens.issue(&principal)?;
    tracing::info!(principal_id = %principal.id, role = %principal.role, "session issued");

    Ok(Json(SessionResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.ttl().as_secs(),
        principal: principal.into(),
    }))
}
