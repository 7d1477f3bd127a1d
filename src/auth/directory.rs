// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity store seam.
//!
//! The gatekeeper reads principals through [`PrincipalDirectory`]; the
//! persistence layer behind it is external. [`InMemoryDirectory`] is the
//! in-process implementation used by the binary and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use super::principal::Principal;

/// API key prefix
pub const API_KEY_PREFIX: &str = "sk_";

/// Identity store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// A unique attribute is already taken by another principal
    #[error("{0} already exists")]
    Conflict(&'static str),

    /// Backend unavailable or returned garbage
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only principal lookups.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Find a principal by its unique ID.
    async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, DirectoryError>;

    /// Find every principal whose stored API key equals `key` exactly.
    ///
    /// Keys are unique by contract; more than one result is a data-integrity
    /// fault the caller must treat as such.
    async fn find_by_api_key(&self, key: &str) -> Result<Vec<Principal>, DirectoryError>;
}

/// Byte-exact comparison whose running time does not depend on where the
/// inputs differ.
pub fn secrets_match(presented: &str, stored: &str) -> bool {
    let (a, b) = (presented.as_bytes(), stored.as_bytes());
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Generate a fresh API key: `sk_` followed by 24 random bytes (URL-safe base64).
pub fn generate_api_key() -> Result<String, DirectoryError> {
    let mut bytes = [0u8; 24];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| DirectoryError::Unavailable("system RNG failure".to_string()))?;
    Ok(format!(
        "{API_KEY_PREFIX}{}",
        Base64UrlUnpadded::encode_string(&bytes)
    ))
}

/// In-memory principal store.
#[derive(Default)]
pub struct InMemoryDirectory {
    principals: RwLock<HashMap<String, Principal>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a principal, enforcing uniqueness of id, email, national code,
    /// personal code and API key.
    pub async fn insert(&self, principal: Principal) -> Result<(), DirectoryError> {
        let mut principals = self.principals.write().await;

        if principals.contains_key(&principal.id) {
            return Err(DirectoryError::Conflict("principal id"));
        }

        for existing in principals.values() {
            if same_value(&existing.email, &principal.email) {
                return Err(DirectoryError::Conflict("email"));
            }
            if same_value(&existing.national_code, &principal.national_code) {
                return Err(DirectoryError::Conflict("national code"));
            }
            if same_value(&existing.personal_code, &principal.personal_code) {
                return Err(DirectoryError::Conflict("personal code"));
            }
            if same_value(&existing.api_key, &principal.api_key) {
                return Err(DirectoryError::Conflict("API key"));
            }
        }

        principals.insert(principal.id.clone(), principal);
        Ok(())
    }

    /// Replace a principal's record as-is, without uniqueness checks.
    #[cfg(test)]
    pub(crate) async fn upsert_unchecked(&self, principal: Principal) {
        self.principals
            .write()
            .await
            .insert(principal.id.clone(), principal);
    }

    /// Mark a principal inactive. Returns false if unknown.
    pub async fn deactivate(&self, id: &str) -> bool {
        match self.principals.write().await.get_mut(id) {
            Some(principal) => {
                principal.active = false;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.principals.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.principals.read().await.is_empty()
    }
}

fn same_value(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

#[async_trait]
impl PrincipalDirectory for InMemoryDirectory {
    async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, DirectoryError> {
        Ok(self.principals.read().await.get(id).cloned())
    }

    async fn find_by_api_key(&self, key: &str) -> Result<Vec<Principal>, DirectoryError> {
        let principals = self.principals.read().await;

        // Visit every record so timing does not reveal where a match sits.
        let mut matches = Vec::new();
        for principal in principals.values() {
            if let Some(stored) = &principal.api_key {
                if secrets_match(key, stored) {
                    matches.push(principal.clone());
                }
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    #[tokio::test]
    async fn finds_principal_by_id_and_key() {
        let directory = InMemoryDirectory::new();
        directory
            .insert(Principal::new("u1", Role::User).with_api_key("sk_one"))
            .await
            .unwrap();

        let found = directory.find_by_id("u1").await.unwrap().unwrap();
        assert_eq!(found.id, "u1");

        let by_key = directory.find_by_api_key("sk_one").await.unwrap();
        assert_eq!(by_key.len(), 1);
        assert!(directory.find_by_api_key("sk_on").await.unwrap().is_empty());
        assert!(directory.find_by_id("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_unique_attributes() {
        let directory = InMemoryDirectory::new();
        directory
            .insert(
                Principal::new("u1", Role::User)
                    .with_email("a@example.com")
                    .with_api_key("sk_one")
                    .with_codes("111", "EMP1"),
            )
            .await
            .unwrap();

        let dup_email = Principal::new("u2", Role::User).with_email("a@example.com");
        assert_eq!(
            directory.insert(dup_email).await,
            Err(DirectoryError::Conflict("email"))
        );

        let dup_code = Principal::new("u3", Role::User).with_codes("111", "EMP2");
        assert_eq!(
            directory.insert(dup_code).await,
            Err(DirectoryError::Conflict("national code"))
        );

        let dup_key = Principal::new("u4", Role::User).with_api_key("sk_one");
        assert_eq!(
            directory.insert(dup_key).await,
            Err(DirectoryError::Conflict("API key"))
        );

        let dup_id = Principal::new("u1", Role::Admin);
        assert_eq!(
            directory.insert(dup_id).await,
            Err(DirectoryError::Conflict("principal id"))
        );
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn principals_without_keys_do_not_conflict() {
        let directory = InMemoryDirectory::new();
        directory.insert(Principal::new("u1", Role::User)).await.unwrap();
        directory.insert(Principal::new("u2", Role::User)).await.unwrap();
        assert!(directory.find_by_api_key("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deactivate_marks_inactive() {
        let directory = InMemoryDirectory::new();
        directory.insert(Principal::new("u1", Role::User)).await.unwrap();
        assert!(directory.deactivate("u1").await);
        assert!(!directory.find_by_id("u1").await.unwrap().unwrap().active);
        assert!(!directory.deactivate("ghost").await);
    }

    #[test]
    fn generated_keys_are_prefixed_and_distinct() {
        let a = generate_api_key().unwrap();
        let b = generate_api_key().unwrap();
        assert!(a.starts_with(API_KEY_PREFIX));
        assert_eq!(a.len(), API_KEY_PREFIX.len() + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn secrets_match_requires_exact_bytes() {
        assert!(secrets_match("s1", "s1"));
        assert!(!secrets_match("s1", "s2"));
        assert!(!secrets_match("s1", "s1 "));
        assert!(!secrets_match("", "s1"));
    }
}
