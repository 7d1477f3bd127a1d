// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chat message submission.
//!
//! Persistence is handled downstream; this endpoint only admits the message
//! and hands back a receipt.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::GateContext,
    error::ApiError,
    state::{actions, AppState},
};

/// Request body for POST /v1/chats/{chat_id}/messages
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Principal the message is sent as (operational callers)
    #[serde(default)]
    pub user: Option<String>,
    /// Message text
    pub content: String,
}

/// Acceptance receipt.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageReceipt {
    pub message_id: Uuid,
    pub chat_id: String,
    pub principal_id: String,
    pub accepted_at: DateTime<Utc>,
    /// Messages left in the current window
    pub remaining_quota: u32,
}

/// Submit a message to a chat.
#[utoipa::path(
    post,
    path = "/v1/chats/{chat_id}/messages",
    tag = "Messages",
    security(("bearer_auth" = []), ("api_key" = [])),
    params(("chat_id" = String, Path, description = "Chat ID")),
    request_body = SendMessageRequest,
    responses(
        (status = 202, description = "Message accepted", body = MessageReceipt),
        (status = 400, description = "Empty message"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Insufficient role"),
        (status = 429, description = "Message quota used up")
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    GateContext(ctx): GateContext,
    Path(chat_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageReceipt>), ApiError> {
    // Refused before admission so an empty message costs no quota.
    if request.content.trim().is_empty() {
        return Err(ApiError::bad_request("Message content must not be empty"));
    }

    let ctx = ctx.with_body(serde_json::json!({ "user": request.user }));
    let spec = state.config.rate_limits.message;
    let required = state.policy.required_role(actions::MESSAGES_CREATE);
    let principal = state.gatekeeper.admit(&ctx, Some(required), Some(&spec)).await?;

    let status = state
        .limiter
        .remaining(spec.kind, &principal.id, spec.max_count, spec.window_hours);
    let receipt = MessageReceipt {
        message_id: Uuid::new_v4(),
        chat_id,
        principal_id: principal.id,
        accepted_at: Utc::now(),
        remaining_quota: status.remaining,
    };
    tracing::debug!(
        message_id = %receipt.message_id,
        chat_id = %receipt.chat_id,
        principal_id = %receipt.principal_id,
        "message accepted"
    );

    Ok((StatusCode::ACCEPTED, Json(receipt)))
}
