// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admission middleware for Axum.
//!
//! Middleware counterpart of the [`Auth`](super::Auth) extractor, for
//! authenticating a whole router subtree before any handler runs. The
//! admitted [`Principal`](super::Principal) is stored in the request
//! extensions, where the extractors pick it up without verifying again.
//!
//! The request body is buffered so a `user` field in a JSON body takes part
//! in the bypass claim, then handed on unchanged. Bodies that are not JSON
//! claim nobody.
//!
//! ```rust,ignore
//! let admin = Router::new()
//!     .route("/stats", get(stats))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         require_principal,
//!     ));
//! ```

use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::GateContext;
use crate::{error::ApiError, state::AppState};

/// Largest body buffered for admission (1 MiB).
pub const MAX_BUFFERED_BODY: usize = 1024 * 1024;

/// Admit the request (bypass or credential; no quota, no role) or reject it.
pub async fn require_principal(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let Ok(GateContext(ctx)) = GateContext::from_request_parts(&mut parts, &state).await;

    let bytes = match to_bytes(body, MAX_BUFFERED_BODY).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(error = %err, "request body not buffered");
            return ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
                .into_response();
        }
    };
    let claim_body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    let ctx = ctx.with_body(claim_body);

    match state.gatekeeper.admit(&ctx, None, None).await {
        Ok(principal) => {
            parts.extensions.insert(principal);
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        Err(err) => err.into_response(),
    }
}
