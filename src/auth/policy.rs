// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role-based authorization.

use std::collections::HashMap;

use super::{Principal, Role};

/// Allow iff the principal's role ranks at least as high as `required`.
///
/// Activity is not re-checked here; inactive principals never get past
/// credential verification.
pub fn authorize(principal: &Principal, required: Role) -> bool {
    principal.role.rank() >= required.rank()
}

/// Minimum role per named action.
///
/// Actions without a rule require [`Role::Admin`].
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    rules: HashMap<String, Role>,
}

impl AuthorizationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, action: impl Into<String>, minimum: Role) -> Self {
        self.rules.insert(action.into(), minimum);
        self
    }

    pub fn required_role(&self, action: &str) -> Role {
        self.rules.get(action).copied().unwrap_or(Role::Admin)
    }

    pub fn permits(&self, principal: &Principal, action: &str) -> bool {
        authorize(principal, self.required_role(action))
    }
}
