// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operational bypass.
//!
//! One configured principal may authenticate with one configured static
//! secret instead of a session token. Both the claimed principal id and the
//! secret must match exactly; anything else falls through to normal
//! verification. An empty id or secret disables the bypass.

use super::{directory::secrets_match, Principal, RequestContext, Role};

/// The single bypass pair of a deployment.
#[derive(Clone, Default)]
pub struct BypassRule {
    principal_id: String,
    secret: String,
    role: Role,
}

impl BypassRule {
    pub fn new(principal_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            secret: secret.into(),
            role: Role::default(),
        }
    }

    /// Rule that never matches.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Role granted to the bypass principal (defaults to `user`).
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn is_active(&self) -> bool {
        !self.principal_id.is_empty() && !self.secret.is_empty()
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl std::fmt::Debug for BypassRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BypassRule")
            .field("principal_id", &self.principal_id)
            .field("secret", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Evaluates the bypass rule against a request.
#[derive(Debug, Clone)]
pub struct BypassEvaluator {
    rule: BypassRule,
}

impl BypassEvaluator {
    pub fn new(rule: BypassRule) -> Self {
        Self { rule }
    }

    /// Resolve the bypass principal, or `None` to continue with normal
    /// verification. Never fails.
    pub fn try_bypass(&self, ctx: &RequestContext) -> Option<Principal> {
        if !self.rule.is_active() {
            return None;
        }

        let claimed = ctx.claimed_principal()?;
        let secret = ctx.authorization_secret()?;

        // Evaluate both comparisons before combining them.
        let id_ok = claimed == self.rule.principal_id;
        let secret_ok = secrets_match(secret, &self.rule.secret);
        if !(id_ok && secret_ok) {
            return None;
        }

        tracing::info!(principal_id = %self.rule.principal_id, "operational bypass granted");
        Some(Principal::new(self.rule.principal_id.clone(), self.rule.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evaluator() -> BypassEvaluator {
        BypassEvaluator::new(BypassRule::new("u1", "s1"))
    }

    fn request(user: &str, authorization: &str) -> RequestContext {
        RequestContext::new()
            .with_body(json!({ "user": user }))
            .with_authorization(authorization)
    }

    #[test]
    fn exact_pair_is_granted() {
        let principal = evaluator().try_bypass(&request("u1", "Bearer s1")).unwrap();
        assert_eq!(principal.id, "u1");
        assert_eq!(principal.role, Role::User);
        assert!(principal.active);
    }

    #[test]
    fn any_single_character_change_falls_through() {
        let evaluator = evaluator();
        for (user, auth) in [
            ("u2", "Bearer s1"),
            ("u1", "Bearer s2"),
            ("U1", "Bearer s1"),
            ("u1", "Bearer S1"),
            ("u1 ", "Bearer s1"),
            ("u", "Bearer s1"),
            ("u1", "Bearer s"),
            ("u1", "Bearer s11"),
        ] {
            assert!(evaluator.try_bypass(&request(user, auth)).is_none(), "{user}/{auth}");
        }
    }

    #[test]
    fn id_alone_or_secret_alone_is_not_enough() {
        let evaluator = evaluator();
        let no_secret = RequestContext::new().with_query("user", "u1");
        assert!(evaluator.try_bypass(&no_secret).is_none());

        let no_claim = RequestContext::new().with_authorization("Bearer s1");
        assert!(evaluator.try_bypass(&no_claim).is_none());
    }

    #[test]
    fn claim_is_read_with_body_query_path_precedence() {
        let evaluator = evaluator();

        let via_path = RequestContext::new()
            .with_path_param("userId", "u1")
            .with_authorization("Bearer s1");
        assert!(evaluator.try_bypass(&via_path).is_some());

        // Body claims another principal, so the matching query value is ignored.
        let shadowed = RequestContext::new()
            .with_body(json!({ "user": "u9" }))
            .with_query("user", "u1")
            .with_authorization("Bearer s1");
        assert!(evaluator.try_bypass(&shadowed).is_none());
    }

    #[test]
    fn empty_configuration_disables_bypass() {
        for rule in [
            BypassRule::new("", "s1"),
            BypassRule::new("u1", ""),
            BypassRule::disabled(),
        ] {
            assert!(!rule.is_active());
            let evaluator = BypassEvaluator::new(rule);
            assert!(evaluator.try_bypass(&request("u1", "Bearer s1")).is_none());
            assert!(evaluator.try_bypass(&request("", "Bearer ")).is_none());
        }
    }

    #[test]
    fn malformed_input_never_panics() {
        let evaluator = evaluator();
        for auth in ["", " ", "Bearer", "\u{0}", "Bearer  s1  extra"] {
            let _ = evaluator.try_bypass(&request("u1", auth));
        }
        let odd_body = RequestContext::new()
            .with_body(json!(["u1"]))
            .with_authorization("Bearer s1");
        assert!(evaluator.try_bypass(&odd_body).is_none());
    }

    #[test]
    fn configured_role_is_granted() {
        let evaluator = BypassEvaluator::new(BypassRule::new("u1", "s1").with_role(Role::Manager));
        let principal = evaluator.try_bypass(&request("u1", "Bearer s1")).unwrap();
        assert_eq!(principal.role, Role::Manager);
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", BypassRule::new("u1", "topsecret"));
        assert!(!rendered.contains("topsecret"));
    }
}
