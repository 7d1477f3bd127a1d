// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{require_principal, ActionKind, PrincipalSummary, Role},
    config::DEFAULT_API_KEY_HEADER,
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod messages;
pub mod users;

pub fn router(state: AppState) -> Router {
    // Authenticated as a subtree; handlers still enforce the admin role.
    let admin_routes = Router::new()
        .route("/principals", post(admin::create_principal))
        .route(
            "/principals/{id}/deactivate",
            post(admin::deactivate_principal),
        )
        .route("/rate-limits/prune", post(admin::prune_rate_limits))
        .route(
            "/rate-limits/{kind}/{key}",
            get(admin::get_rate_limit_status),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_principal,
        ));

    let v1_routes = Router::new()
        .route("/auth/session", post(auth::create_session))
        .route(
            "/users/me",
            get(users::get_current_user).route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_principal,
            )),
        )
        .route("/chats/{chat_id}/messages", post(messages::send_message))
        .nest("/admin", admin_routes)
        .with_state(state);

    Router::new()
        .route("/health/live", get(health::liveness))
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(DEFAULT_API_KEY_HEADER))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        auth::create_session,
        users::get_current_user,
        messages::send_message,
        admin::create_principal,
        admin::deactivate_principal,
        admin::get_rate_limit_status,
        admin::prune_rate_limits
    ),
    components(
        schemas(
            Role,
            ActionKind,
            PrincipalSummary,
            health::HealthResponse,
            auth::CreateSessionRequest,
            auth::SessionResponse,
            users::UserMeResponse,
            messages::SendMessageRequest,
            messages::MessageReceipt,
            admin::CreatePrincipalRequest,
            admin::CreatePrincipalResponse,
            admin::RateLimitStatusResponse,
            admin::PruneResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Auth", description = "Session issuance"),
        (name = "Users", description = "Current principal"),
        (name = "Messages", description = "Chat message submission"),
        (name = "Admin", description = "Principal and quota administration")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatekeeperConfig;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(AppState::new(GatekeeperConfig::new("test-secret")));
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[test]
    fn openapi_lists_gated_paths_and_security_schemes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/auth/session"));
        assert!(doc.paths.paths.contains_key("/v1/chats/{chat_id}/messages"));
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.security_schemes.contains_key("api_key"));
    }
}
