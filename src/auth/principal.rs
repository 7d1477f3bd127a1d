// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principals and the claims carried by session tokens.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims carried by a signed session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (principal ID)
    pub sub: String,

    /// Principal email at issuance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Principal role at issuance
    pub role: Role,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,
}

/// The identity a request acts as.
///
/// Records are owned by the identity store; the gatekeeper only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Principal {
    /// Unique principal identifier
    pub id: String,

    /// Login email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Role used for authorization
    pub role: Role,

    /// Deactivated principals never authenticate
    pub active: bool,

    /// Static API key (never serialized)
    #[serde(skip)]
    pub api_key: Option<String>,

    /// National identification code (uniqueness only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_code: Option<String>,

    /// Employee code (uniqueness only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_code: Option<String>,
}

impl Principal {
    /// Active principal with the given id and role and no other attributes.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            email: None,
            role,
            active: true,
            api_key: None,
            national_code: None,
            personal_code: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_codes(
        mut self,
        national_code: impl Into<String>,
        personal_code: impl Into<String>,
    ) -> Self {
        self.national_code = Some(national_code.into());
        self.personal_code = Some(personal_code.into());
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Check if the principal has the required role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }
}

/// Public view of a principal, as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrincipalSummary {
    /// Principal ID
    pub id: String,
    /// Login email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role
    pub role: Role,
}

impl From<Principal> for PrincipalSummary {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.id,
            email: principal.email,
            role: principal.role,
        }
    }
}
