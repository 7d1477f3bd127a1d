// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require the Admin role and provide:
//! - Principal registration (issues an API key)
//! - Principal deactivation
//! - Quota inspection and idle-window pruning

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{
        context::normalize_identity, generate_api_key, ActionKind, AdminOnly, Auth, GateError,
        Principal, PrincipalSummary, Role,
    },
    error::ApiError,
    state::{actions, AppState},
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for registering a principal.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePrincipalRequest {
    /// Principal ID (generated when omitted)
    #[serde(default)]
    pub id: Option<String>,
    /// Login email
    pub email: String,
    /// Role to grant
    #[serde(default)]
    pub role: Role,
    /// National identification code
    #[serde(default)]
    pub national_code: Option<String>,
    /// Employee code
    #[serde(default)]
    pub personal_code: Option<String>,
}

/// Registered principal with its freshly issued API key.
///
/// The key is shown once and cannot be retrieved later.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePrincipalResponse {
    pub principal: PrincipalSummary,
    pub api_key: String,
}

/// Quota status for one `(kind, key)` pair.
#[derive(Debug, Serialize, ToSchema)]
pub struct RateLimitStatusResponse {
    pub kind: ActionKind,
    pub key: String,
    pub max_count: u32,
    pub window_hours: u32,
    /// Actions still allowed in the current window
    pub remaining: u32,
    /// Seconds until the window resets (0 when no window is running)
    pub reset_in_secs: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PruneResponse {
    /// Number of expired windows dropped
    pub pruned: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a principal and issue its API key.
#[utoipa::path(
    post,
    path = "/v1/admin/principals",
    tag = "Admin",
    security(("bearer_auth" = []), ("api_key" = [])),
    request_body = CreatePrincipalRequest,
    responses(
        (status = 201, description = "Principal registered", body = CreatePrincipalResponse),
        (status = 400, description = "Invalid email"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 409, description = "Email, code or id already taken")
    )
)]
pub async fn create_principal(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<CreatePrincipalRequest>,
) -> Result<(StatusCode, Json<CreatePrincipalResponse>), ApiError> {
    let email = normalize_identity(&request.email);
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("A valid email is required"));
    }

    let id = request
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let api_key = generate_api_key()?;

    let mut principal = Principal::new(id, request.role)
        .with_email(email)
        .with_api_key(api_key.clone());
    principal.national_code = request.national_code;
    principal.personal_code = request.personal_code;

    state.directory.insert(principal.clone()).await?;

    tracing::info!(
        admin_id = %admin.id,
        principal_id = %principal.id,
        role = %principal.role,
        "principal registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatePrincipalResponse {
            principal: principal.into(),
            api_key,
        }),
    ))
}

/// Deactivate a principal. Its credentials stop authenticating immediately.
#[utoipa::path(
    post,
    path = "/v1/admin/principals/{id}/deactivate",
    tag = "Admin",
    security(("bearer_auth" = []), ("api_key" = [])),
    params(("id" = String, Path, description = "Principal ID")),
    responses(
        (status = 204, description = "Principal deactivated"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Unknown principal")
    )
)]
pub async fn deactivate_principal(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.directory.deactivate(&id).await {
        return Err(ApiError::not_found("Principal not found"));
    }
    tracing::info!(admin_id = %admin.id, principal_id = %id, "principal deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// Report the remaining quota for an action kind and key.
///
/// For `message` the key is a principal ID; for `login` it is the derived
/// login key (`identity:...`, `addr:...` or `anonymous`). The minimum role
/// comes from the `rate_limits.read` policy rule.
#[utoipa::path(
    get,
    path = "/v1/admin/rate-limits/{kind}/{key}",
    tag = "Admin",
    security(("bearer_auth" = []), ("api_key" = [])),
    params(
        ("kind" = String, Path, description = "Action kind (`login` or `message`)"),
        ("key" = String, Path, description = "Quota key")
    ),
    responses(
        (status = 200, description = "Quota status", body = RateLimitStatusResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized for quota inspection"),
        (status = 404, description = "Unknown action kind")
    )
)]
pub async fn get_rate_limit_status(
    Auth(principal): Auth,
    State(state): State<AppState>,
    Path((kind, key)): Path<(String, String)>,
) -> Result<Json<RateLimitStatusResponse>, ApiError> {
    if !state.policy.permits(&principal, actions::RATE_LIMITS_READ) {
        return Err(GateError::Forbidden.into());
    }

    let kind = ActionKind::parse(&kind)
        .ok_or_else(|| ApiError::not_found(format!("Unknown action kind: {kind}")))?;
    let spec = state.config.rate_limits.for_kind(kind);
    let status = state
        .limiter
        .remaining(kind, &key, spec.max_count, spec.window_hours);

    Ok(Json(RateLimitStatusResponse {
        kind,
        key,
        max_count: spec.max_count,
        window_hours: spec.window_hours,
        remaining: status.remaining,
        reset_in_secs: status.reset_in_secs,
    }))
}

/// Drop expired quota windows.
#[utoipa::path(
    post,
    path = "/v1/admin/rate-limits/prune",
    tag = "Admin",
    security(("bearer_auth" = []), ("api_key" = [])),
    responses(
        (status = 200, description = "Expired windows dropped", body = PruneResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn prune_rate_limits(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Json<PruneResponse> {
    let pruned = state
        .limiter
        .prune_expired(state.config.rate_limits.max_window_hours());
    Json(PruneResponse { pruned })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_principal_request_defaults_role_to_user() {
        let request: CreatePrincipalRequest =
            serde_json::from_str(r#"{"email": "jane@example.com"}"#).unwrap();
        assert_eq!(request.role, Role::User);
        assert!(request.id.is_none());
    }

    #[test]
    fn create_principal_response_serializes_key_once() {
        let response = CreatePrincipalResponse {
            principal: Principal::new("p1", Role::Manager)
                .with_api_key("sk_hidden")
                .into(),
            api_key: "sk_shown".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("sk_shown"));
        assert!(!json.contains("sk_hidden"));
        assert!(json.contains(r#""role":"manager""#));
    }

    #[test]
    fn rate_limit_status_serializes_kind_lowercase() {
        let status = RateLimitStatusResponse {
            kind: ActionKind::Message,
            key: "user_1".to_string(),
            max_count: 50,
            window_hours: 1,
            remaining: 49,
            reset_in_secs: 3599,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""kind":"message""#));
    }
}
