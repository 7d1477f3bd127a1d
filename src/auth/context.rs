// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transport-neutral view of an inbound request.
//!
//! ## Credential precedence
//!
//! 1. Bypass: claimed principal id + secret in the `Authorization` header
//!    (see [`BypassEvaluator`](super::BypassEvaluator))
//! 2. `Authorization: Bearer <session token>`
//! 3. `Authorization: Api-Key <key>`, or the dedicated API-key header
//!
//! When both a bearer token and a dedicated API-key header are present the
//! bearer token wins.
//!
//! ## Claimed principal precedence
//!
//! The claimed principal id is read from, in order: body field `user`,
//! query parameter `user`, path parameter `userId`, path parameter `id`.
//! The first non-empty value wins.
//!
//! A request that carries a body the gatekeeper has not read claims nobody:
//! the body would outrank the query and path, so falling through to them
//! could admit a request under an id the body contradicts.

use std::collections::HashMap;
use std::net::IpAddr;

use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use super::AuthError;

/// Bucket shared by login attempts that carry neither identity nor address.
pub const ANONYMOUS_LOGIN_KEY: &str = "anonymous";

/// A credential as presented, before verification.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Signed session token
    Bearer(String),
    /// Opaque static API key
    ApiKey(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Credential::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

/// Where a claimed principal id can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimSource {
    /// JSON body field `user`
    Body,
    /// Query parameter `user`
    Query,
    /// Path parameter `userId`, then `id`
    Path,
}

impl ClaimSource {
    /// Fixed extraction order. Part of the admission contract.
    pub const PRECEDENCE: [ClaimSource; 3] =
        [ClaimSource::Body, ClaimSource::Query, ClaimSource::Path];

    fn extract<'a>(self, ctx: &'a RequestContext) -> Option<&'a str> {
        let value = match self {
            ClaimSource::Body => ctx
                .body
                .as_ref()
                .and_then(|body| body.get("user"))
                .and_then(|value| value.as_str()),
            ClaimSource::Query => ctx.query.get("user").map(String::as_str),
            ClaimSource::Path => ["userId", "id"]
                .iter()
                .filter_map(|name| ctx.path.get(*name).map(String::as_str))
                .find(|value| !value.is_empty()),
        };
        value.filter(|value| !value.is_empty())
    }
}

/// Everything the gatekeeper reads from a request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    authorization: Option<String>,
    api_key: Option<String>,
    body: Option<serde_json::Value>,
    body_uninspected: bool,
    query: HashMap<String, String>,
    path: HashMap<String, String>,
    source_addr: Option<IpAddr>,
    attempted_identity: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `Authorization` header value.
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Shorthand for `Authorization: Bearer <token>`.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_authorization(format!("Bearer {token}"))
    }

    /// Value of the dedicated API-key header.
    pub fn with_api_key_header(mut self, value: impl Into<String>) -> Self {
        self.api_key = Some(value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self.body_uninspected = false;
        self
    }

    /// Marks a request body as present but unread. Cleared by [`Self::with_body`].
    pub fn with_uninspected_body(mut self) -> Self {
        self.body = None;
        self.body_uninspected = true;
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_query_map(mut self, query: HashMap<String, String>) -> Self {
        self.query.extend(query);
        self
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    pub fn with_source_addr(mut self, addr: IpAddr) -> Self {
        self.source_addr = Some(addr);
        self
    }

    /// Identity a login attempt claims to be (e.g. the submitted email).
    pub fn with_attempted_identity(mut self, identity: impl Into<String>) -> Self {
        self.attempted_identity = Some(identity.into());
        self
    }

    pub fn source_addr(&self) -> Option<IpAddr> {
        self.source_addr
    }

    pub fn attempted_identity(&self) -> Option<&str> {
        self.attempted_identity.as_deref()
    }

    /// Principal id the request claims to act as, per [`ClaimSource::PRECEDENCE`].
    pub fn claimed_principal(&self) -> Option<&str> {
        if self.body_uninspected {
            return None;
        }
        ClaimSource::PRECEDENCE
            .iter()
            .find_map(|source| source.extract(self))
    }

    /// Second whitespace-separated token of the `Authorization` header,
    /// whatever the scheme.
    pub fn authorization_secret(&self) -> Option<&str> {
        self.authorization
            .as_deref()?
            .split_whitespace()
            .nth(1)
            .filter(|secret| !secret.is_empty())
    }

    /// The credential to verify, applying bearer > api-key precedence.
    pub fn credential(&self) -> Result<Credential, AuthError> {
        let from_header = match self.authorization.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(parse_authorization(value)?),
        };

        if let Some(credential) = from_header {
            return Ok(credential);
        }

        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(Credential::ApiKey(key.to_string())),
            _ => Err(AuthError::MissingCredentials),
        }
    }

    /// Rate-limit key for login attempts, derived before authentication.
    ///
    /// Attempted identity (normalized, hashed) first, then the source address,
    /// then a shared anonymous bucket.
    pub fn login_key(&self) -> String {
        if let Some(identity) = self.attempted_identity.as_deref() {
            let normalized = normalize_identity(identity);
            if !normalized.is_empty() {
                let digest = Sha256::digest(normalized.as_bytes());
                return format!("identity:{}", Base64UrlUnpadded::encode_string(&digest));
            }
        }
        match self.source_addr {
            Some(addr) => format!("addr:{addr}"),
            None => ANONYMOUS_LOGIN_KEY.to_string(),
        }
    }
}

/// NFKC, trimmed, lowercased.
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().nfkc().collect::<String>().to_lowercase()
}

fn parse_authorization(value: &str) -> Result<Credential, AuthError> {
    let mut parts = value.split_whitespace();
    let scheme = parts.next().ok_or(AuthError::MalformedCredentials)?;
    let secret = parts.next().ok_or(AuthError::MalformedCredentials)?;
    if parts.next().is_some() {
        return Err(AuthError::MalformedCredentials);
    }

    match scheme.to_ascii_lowercase().as_str() {
        "bearer" => Ok(Credential::Bearer(secret.to_string())),
        "api-key" | "apikey" => Ok(Credential::ApiKey(secret.to_string())),
        _ => Err(AuthError::MalformedCredentials),
    }
}
