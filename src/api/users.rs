// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::{Auth, GateError, Principal, Role},
    error::ApiError,
    state::{actions, AppState},
};

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Principal ID
    pub id: String,
    /// Login email (absent for the operational principal)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Principal's role
    pub role: Role,
}

impl From<Principal> for UserMeResponse {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.id,
            email: principal.email,
            role: principal.role,
        }
    }
}

/// Get the current authenticated principal.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = []), ("api_key" = [])),
    responses(
        (status = 200, description = "Principal information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing credential"),
        (status = 403, description = "Role below the `users.me` policy rule"),
    )
)]
pub async fn get_current_user(
    Auth(principal): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserMeResponse>, ApiError> {
    if !state.policy.permits(&principal, actions::USERS_ME) {
        return Err(GateError::Forbidden.into());
    }
    Ok(Json(principal.into()))
}
