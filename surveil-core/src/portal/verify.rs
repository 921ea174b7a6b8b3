use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("user {username} rejected: {reason}")]
pub struct VerificationError {
    pub username: String,
    pub reason: String,
}

/// Consulted before every login attempt. A rejection ends the monitor.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str) -> Result<(), VerificationError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl CredentialVerifier for AcceptAll {
    async fn verify(&self, _username: &str) -> Result<(), VerificationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AllowList {
    users: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for AllowList {
    async fn verify(&self, username: &str) -> Result<(), VerificationError> {
        if self.users.contains(username) {
            Ok(())
        } else {
            Err(VerificationError {
                username: username.to_string(),
                reason: "not on the allow list".to_string(),
            })
        }
    }
}
