//! The trait's trivial implementation: validates credentials against a
//! locally-held, pre-hashed value with no upstream round-trip. Used both as
//! a real (if minimal) provider and as the fixture for exercising the
//! shared `PatronData`/`BlockReason` plumbing without a network dependency.

use atrium_core::PatronData;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AuthError;
use crate::provider::{AuthFuture, AuthenticationProvider};

fn hash_password(password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// One locally-defined credential: `username` plus the SHA-256 digest of
/// the expected password.
#[derive(Clone, Debug)]
pub struct LocalCredential {
    pub username: String,
    pub password_hash: [u8; 32],
    pub permanent_id: String,
}

impl LocalCredential {
    pub fn new(username: impl Into<String>, password: &str, permanent_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: hash_password(password),
            permanent_id: permanent_id.into(),
        }
    }
}

/// Validates credentials against an in-memory list of [`LocalCredential`]s.
/// Comparison of the password digest is constant-time to avoid leaking
/// match length through timing.
pub struct BasicLocalProvider {
    credentials: Vec<LocalCredential>,
}

impl BasicLocalProvider {
    pub fn new(credentials: Vec<LocalCredential>) -> Self {
        Self { credentials }
    }

    fn find(&self, username: &str, password: &str) -> Option<&LocalCredential> {
        let digest = hash_password(password);
        self.credentials
            .iter()
            .find(|c| c.username == username && bool::from(c.password_hash.ct_eq(&digest)))
    }
}

impl AuthenticationProvider for BasicLocalProvider {
    fn remote_authenticate(&self, username: Option<String>, password: Option<String>) -> AuthFuture<Option<PatronData>> {
        let found = match (username, password) {
            (Some(username), Some(password)) => self.find(&username, &password).map(|credential| {
                let mut data = PatronData::new(credential.permanent_id.clone());
                data.authorization_identifier = Some(credential.username.clone());
                data.complete = true;
                data
            }),
            _ => None,
        };
        Box::pin(async move { Ok(found) })
    }

    fn remote_patron_lookup(&self, patron: PatronData) -> AuthFuture<Option<PatronData>> {
        Box::pin(async move { Ok(Some(patron)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> BasicLocalProvider {
        BasicLocalProvider::new(vec![LocalCredential::new("alice", "hunter2", "patron-1")])
    }

    #[tokio::test]
    async fn authenticates_matching_credential() {
        let result = provider()
            .remote_authenticate(Some("alice".to_string()), Some("hunter2".to_string()))
            .await
            .unwrap();
        assert_eq!(result.unwrap().permanent_id, "patron-1");
    }

    #[tokio::test]
    async fn rejects_wrong_password() {
        let result = provider()
            .remote_authenticate(Some("alice".to_string()), Some("wrong".to_string()))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn rejects_unknown_username() {
        let result = provider()
            .remote_authenticate(Some("bob".to_string()), Some("hunter2".to_string()))
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
