// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal roles and their total order.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Principal roles for authorization.
///
/// ## Role Hierarchy
///
/// Roles form a total order, lowest first:
///
/// `User < Supervisor < Manager < Admin`
///
/// A principal holding a role may perform every action that requires that
/// role or any lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account (chats, messages, own documents)
    User,
    /// Team supervisor
    Supervisor,
    /// Department manager
    Manager,
    /// Full administrative access
    Admin,
}

impl Role {
    /// All roles, ordered by rank.
    pub const ALL: [Role; 4] = [Role::User, Role::Supervisor, Role::Manager, Role::Admin];

    /// Position of this role in the total order.
    pub fn rank(self) -> u8 {
        match self {
            Role::User => 0,
            Role::Supervisor => 1,
            Role::Manager => 2,
            Role::Admin => 3,
        }
    }

    /// Inverse of [`Role::rank`].
    pub fn from_rank(rank: u8) -> Option<Role> {
        Role::ALL.get(usize::from(rank)).copied()
    }

    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    /// Parse role from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Role::User),
            "supervisor" => Some(Role::Supervisor),
            "manager" => Some(Role::Manager),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl Default for Role {
    /// Least privilege.
    fn default() -> Self {
        Role::User
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Supervisor => write!(f, "supervisor"),
            Role::Manager => write!(f, "manager"),
            Role::Admin => write!(f, "admin"),
        }
    }
}
