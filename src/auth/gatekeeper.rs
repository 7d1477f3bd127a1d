// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request admission.
//!
//! 1. Bypass: a granted bypass jumps straight to step 5.
//! 2. Login-kind quota, keyed by the pre-authentication identity.
//! 3. Credential verification.
//! 4. Other quotas, keyed by the authenticated principal.
//! 5. Role check, when the action requires one.
//!
//! Every stage failure is terminal and maps to exactly one [`GateError`]
//! variant. Bypassed requests skip verification and quotas but still go
//! through the role check.

use std::sync::Arc;

use super::{
    authorize, BypassEvaluator, CredentialVerifier, GateError, Principal, RateLimitSpec,
    RateLimiter, RequestContext, Role,
};

/// Composes bypass, verification, quotas and authorization.
#[derive(Clone)]
pub struct Gatekeeper {
    bypass: BypassEvaluator,
    verifier: CredentialVerifier,
    limiter: Arc<RateLimiter>,
}

impl Gatekeeper {
    pub fn new(
        bypass: BypassEvaluator,
        verifier: CredentialVerifier,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            bypass,
            verifier,
            limiter,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Decide whether the request may proceed, and as whom.
    pub async fn admit(
        &self,
        ctx: &RequestContext,
        required_role: Option<Role>,
        rate_limit: Option<&RateLimitSpec>,
    ) -> Result<Principal, GateError> {
        if let Some(principal) = self.bypass.try_bypass(ctx) {
            return Self::authorize_stage(principal, required_role);
        }

        // Login attempts are counted before the credential is looked at, so
        // failed attempts use up quota too.
        if let Some(spec) = rate_limit.filter(|spec| spec.kind.is_pre_authentication()) {
            self.limiter.check_spec(spec, &ctx.login_key())?;
        }

        let credential = ctx.credential().inspect_err(|err| {
            tracing::debug!(reason = err.error_code(), "no usable credential");
        })?;
        let principal = self.verifier.verify(&credential).await.inspect_err(|err| {
            tracing::debug!(reason = err.error_code(), "credential rejected");
        })?;

        if let Some(spec) = rate_limit.filter(|spec| !spec.kind.is_pre_authentication()) {
            self.limiter.check_spec(spec, &principal.id)?;
        }

        Self::authorize_stage(principal, required_role)
    }

    fn authorize_stage(
        principal: Principal,
        required_role: Option<Role>,
    ) -> Result<Principal, GateError> {
        match required_role {
            Some(required) if !authorize(&principal, required) => {
                tracing::debug!(
                    principal_id = %principal.id,
                    role = %principal.role,
                    required = %required,
                    "insufficient role"
                );
                Err(GateError::Forbidden)
            }
            _ => Ok(principal),
        }
    }
}
