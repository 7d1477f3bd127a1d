// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{
    AuthorizationPolicy, BypassEvaluator, Clock, CredentialVerifier, Gatekeeper,
    InMemoryDirectory, RateLimiter, Role, SessionTokens, SystemClock,
};
use crate::config::GatekeeperConfig;

/// Policy action names used by the HTTP handlers.
pub mod actions {
    pub const SESSION_CREATE: &str = "session.create";
    pub const USERS_ME: &str = "users.me";
    pub const MESSAGES_CREATE: &str = "messages.create";
    pub const RATE_LIMITS_READ: &str = "rate_limits.read";
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatekeeperConfig>,
    pub directory: Arc<InMemoryDirectory>,
    pub tokens: SessionTokens,
    pub limiter: Arc<RateLimiter>,
    pub gatekeeper: Gatekeeper,
    pub policy: Arc<AuthorizationPolicy>,
}

impl AppState {
    pub fn new(config: GatekeeperConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// State whose rate-limit windows follow `clock`.
    pub fn with_clock(config: GatekeeperConfig, clock: Arc<dyn Clock>) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let tokens = SessionTokens::new(config.jwt_secret.as_bytes(), config.jwt_ttl);
        let limiter = Arc::new(RateLimiter::with_clock(clock));
        let gatekeeper = Gatekeeper::new(
            BypassEvaluator::new(config.bypass.clone()),
            CredentialVerifier::new(tokens.clone(), directory.clone()),
            limiter.clone(),
        );

        Self {
            config: Arc::new(config),
            directory,
            tokens,
            limiter,
            gatekeeper,
            policy: Arc::new(default_policy()),
        }
    }
}

fn default_policy() -> AuthorizationPolicy {
    AuthorizationPolicy::new()
        .with_rule(actions::SESSION_CREATE, Role::User)
        .with_rule(actions::USERS_ME, Role::User)
        .with_rule(actions::MESSAGES_CREATE, Role::User)
        .with_rule(actions::RATE_LIMITS_READ, Role::Admin)
}
