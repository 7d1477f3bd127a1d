// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential verification.
//!
//! Turns a presented [`Credential`] into an active [`Principal`] or a
//! definitive [`AuthError`]. The only side effect is the identity-store read.

use std::sync::Arc;

use super::{
    directory::{secrets_match, DirectoryError, PrincipalDirectory},
    AuthError, Credential, Principal, SessionTokens,
};

/// Verifies session tokens and static API keys against the identity store.
#[derive(Clone)]
pub struct CredentialVerifier {
    tokens: SessionTokens,
    directory: Arc<dyn PrincipalDirectory>,
}

impl CredentialVerifier {
    pub fn new(tokens: SessionTokens, directory: Arc<dyn PrincipalDirectory>) -> Self {
        Self { tokens, directory }
    }

    /// Verify a credential and resolve its principal.
    pub async fn verify(&self, credential: &Credential) -> Result<Principal, AuthError> {
        match credential {
            Credential::Bearer(token) => self.verify_session_token(token).await,
            Credential::ApiKey(key) => self.verify_api_key(key).await,
        }
    }

    async fn verify_session_token(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.tokens.decode(token)?;

        let principal = self
            .directory
            .find_by_id(&claims.sub)
            .await
            .map_err(directory_failure)?
            .ok_or(AuthError::PrincipalNotFound)?;

        if !principal.active {
            return Err(AuthError::PrincipalInactive);
        }

        Ok(principal)
    }

    async fn verify_api_key(&self, key: &str) -> Result<Principal, AuthError> {
        if key.is_empty() {
            return Err(AuthError::InvalidApiKey);
        }

        let mut matches = self
            .directory
            .find_by_api_key(key)
            .await
            .map_err(directory_failure)?;

        if matches.len() > 1 {
            tracing::error!(
                matches = matches.len(),
                "API key lookup returned more than one principal"
            );
            return Err(AuthError::AmbiguousApiKey);
        }

        let principal = matches.pop().ok_or(AuthError::InvalidApiKey)?;

        // The store is trusted for lookup, not for exactness.
        let exact = principal
            .api_key
            .as_deref()
            .is_some_and(|stored| secrets_match(key, stored));
        if !exact || !principal.active {
            return Err(AuthError::InvalidApiKey);
        }

        Ok(principal)
    }
}

fn directory_failure(err: DirectoryError) -> AuthError {
    tracing::error!(error = %err, "identity store lookup failed");
    AuthError::InternalError(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::auth::{InMemoryDirectory, Role};

    const SECRET: &[u8] = b"verifier-secret";

    async fn setup() -> (CredentialVerifier, Arc<InMemoryDirectory>, SessionTokens) {
        let directory = Arc::new(InMemoryDirectory::new());
        directory
            .insert(
                Principal::new("alice", Role::Manager)
                    .with_email("alice@example.com")
                    .with_api_key("sk_alice"),
            )
            .await
            .unwrap();
        directory
            .insert(
                Principal::new("bob", Role::User)
                    .with_api_key("sk_bob")
                    .deactivated(),
            )
            .await
            .unwrap();

        let tokens = SessionTokens::new(SECRET, Duration::from_secs(600));
        let verifier = CredentialVerifier::new(tokens.clone(), directory.clone());
        (verifier, directory, tokens)
    }

    #[tokio::test]
    async fn valid_token_resolves_principal() {
        let (verifier, _, tokens) = setup().await;
        let token = tokens.issue(&Principal::new("alice", Role::Manager)).unwrap();

        let principal = verifier.verify(&Credential::Bearer(token)).await.unwrap();
        assert_eq!(principal.id, "alice");
        assert_eq!(principal.role, Role::Manager);
    }

    #[tokio::test]
    async fn token_for_unknown_or_inactive_principal_fails() {
        let (verifier, _, tokens) = setup().await;

        let ghost = tokens.issue(&Principal::new("ghost", Role::User)).unwrap();
        assert_eq!(
            verifier.verify(&Credential::Bearer(ghost)).await,
            Err(AuthError::PrincipalNotFound)
        );

        let bob = tokens.issue(&Principal::new("bob", Role::User)).unwrap();
        assert_eq!(
            verifier.verify(&Credential::Bearer(bob)).await,
            Err(AuthError::PrincipalInactive)
        );
    }

    #[tokio::test]
    async fn role_comes_from_the_store_not_the_token() {
        let (verifier, _, tokens) = setup().await;
        // Token minted while alice claimed admin; the store says manager.
        let token = tokens.issue(&Principal::new("alice", Role::Admin)).unwrap();
        let principal = verifier.verify(&Credential::Bearer(token)).await.unwrap();
        assert_eq!(principal.role, Role::Manager);
    }

    #[tokio::test]
    async fn api_key_lookup() {
        let (verifier, _, _) = setup().await;

        let principal = verifier
            .verify(&Credential::ApiKey("sk_alice".into()))
            .await
            .unwrap();
        assert_eq!(principal.id, "alice");

        for key in ["sk_alic", "sk_alice2", "SK_ALICE", ""] {
            assert_eq!(
                verifier.verify(&Credential::ApiKey(key.into())).await,
                Err(AuthError::InvalidApiKey),
                "{key}"
            );
        }
    }

    #[tokio::test]
    async fn api_key_of_inactive_principal_is_invalid() {
        let (verifier, _, _) = setup().await;
        assert_eq!(
            verifier.verify(&Credential::ApiKey("sk_bob".into())).await,
            Err(AuthError::InvalidApiKey)
        );
    }

    #[tokio::test]
    async fn duplicate_api_key_is_an_internal_error() {
        let (verifier, directory, _) = setup().await;
        directory
            .upsert_unchecked(Principal::new("mallory", Role::Admin).with_api_key("sk_alice"))
            .await;

        assert_eq!(
            verifier.verify(&Credential::ApiKey("sk_alice".into())).await,
            Err(AuthError::AmbiguousApiKey)
        );
    }

    struct BrokenDirectory;

    #[async_trait]
    impl PrincipalDirectory for BrokenDirectory {
        async fn find_by_id(&self, _id: &str) -> Result<Option<Principal>, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".into()))
        }

        async fn find_by_api_key(&self, _key: &str) -> Result<Vec<Principal>, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn store_failures_surface_as_internal_errors() {
        let tokens = SessionTokens::new(SECRET, Duration::from_secs(600));
        let verifier = CredentialVerifier::new(tokens.clone(), Arc::new(BrokenDirectory));

        let token = tokens.issue(&Principal::new("alice", Role::User)).unwrap();
        let err = verifier.verify(&Credential::Bearer(token)).await.unwrap_err();
        assert!(err.is_internal());

        let err = verifier
            .verify(&Credential::ApiKey("sk_alice".into()))
            .await
            .unwrap_err();
        assert!(err.is_internal());
    }

    /// Store that answers with whatever record it holds, ignoring the key.
    struct SloppyDirectory(Principal);

    #[async_trait]
    impl PrincipalDirectory for SloppyDirectory {
        async fn find_by_id(&self, _id: &str) -> Result<Option<Principal>, DirectoryError> {
            Ok(Some(self.0.clone()))
        }

        async fn find_by_api_key(&self, _key: &str) -> Result<Vec<Principal>, DirectoryError> {
            Ok(vec![self.0.clone()])
        }
    }

    #[tokio::test]
    async fn inexact_store_match_is_rejected() {
        let tokens = SessionTokens::new(SECRET, Duration::from_secs(600));
        let directory = SloppyDirectory(Principal::new("carol", Role::User).with_api_key("sk_carol"));
        let verifier = CredentialVerifier::new(tokens, Arc::new(directory));

        assert_eq!(
            verifier.verify(&Credential::ApiKey("sk_guess".into())).await,
            Err(AuthError::InvalidApiKey)
        );
    }
}
