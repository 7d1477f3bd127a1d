// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Gatekeeping
//!
//! Decides, for every inbound request, whether it is authenticated, within
//! quota, and authorized for the action it asks for.
//!
//! ## Admission Flow
//!
//! 1. [`BypassEvaluator`] - pinned operational principal + static secret
//! 2. [`CredentialVerifier`] - `Authorization: Bearer <session token>`, or an
//!    API key (`Authorization: Api-Key <key>` / dedicated header)
//! 3. [`RateLimiter`] - fixed-window quotas per action kind; login attempts
//!    are counted before verification
//! 4. [`authorize`] - role total order `user < supervisor < manager < admin`
//!
//! [`Gatekeeper::admit`] sequences the stages and returns the resolved
//! [`Principal`] or a terminal [`GateError`].
//!
//! ## Security
//!
//! - Secrets (API keys, bypass secret) are compared in constant time
//! - An empty bypass id or secret disables the bypass
//! - Clients only learn the failure category, never the failing check
//! - Session tokens are HS256 with 60 seconds of clock skew tolerance

pub mod bypass;
pub mod context;
pub mod directory;
pub mod error;
pub mod extractor;
pub mod gatekeeper;
pub mod middleware;
pub mod policy;
pub mod principal;
pub mod rate_limit;
pub mod roles;
pub mod token;
pub mod verifier;

pub use bypass::{BypassEvaluator, BypassRule};
pub use context::{ClaimSource, Credential, RequestContext};
pub use directory::{generate_api_key, DirectoryError, InMemoryDirectory, PrincipalDirectory};
pub use error::{AuthError, GateError, RateLimitError};
pub use extractor::{AdminOnly, Auth, GateContext, RequireRole};
pub use gatekeeper::Gatekeeper;
pub use middleware::require_principal;
pub use policy::{authorize, AuthorizationPolicy};
pub use principal::{Principal, PrincipalSummary, SessionClaims};
pub use rate_limit::{
    ActionKind, Clock, ManualClock, RateLimitSpec, RateLimiter, RateStatus, SystemClock,
};
pub use roles::Role;
pub use token::SessionTokens;
pub use verifier::CredentialVerifier;
