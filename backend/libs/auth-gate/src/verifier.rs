//! Credential verification capability consumed by the gate.
//!
//! The gate treats the verifier as a black box: given a credential and an
//! optional subject hint it returns the subject and, possibly, a replacement
//! credential the caller should adopt.

use session_store::StoreError;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    pub credential: String,
    /// Subject the caller believes it is acting as
    pub subject_hint: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub subject_id: u64,
    /// Replacement credential to relay back to the caller
    pub rotated_credential: Option<String>,
}

impl Verified {
    pub fn new(subject_id: u64) -> Self {
        Self {
            subject_id,
            rotated_credential: None,
        }
    }

    pub fn with_rotation(mut self, credential: impl Into<String>) -> Self {
        self.rotated_credential = Some(credential.into());
        self
    }

    /// Rotated credential, ignoring empty strings
    pub fn rotation(&self) -> Option<&str> {
        self.rotated_credential
            .as_deref()
            .filter(|credential| !credential.is_empty())
    }
}

#[derive(Debug, Clone, Error)]
pub enum VerifyError {
    /// Invalid, expired or revoked credential
    #[error("credential rejected: {0}")]
    Rejected(String),

    /// The verifier could not reach its own backing services
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for VerifyError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            VerifyError::Rejected(err.to_string())
        } else {
            VerifyError::Unavailable(err.to_string())
        }
    }
}

#[async_trait::async_trait]
pub trait Verifier: Send + Sync {
    async fn verify_token(&self, request: VerifyRequest) -> Result<Verified, VerifyError>;
}

#[async_trait::async_trait]
impl<V> Verifier for Arc<V>
where
    V: Verifier + ?Sized,
{
    async fn verify_token(&self, request: VerifyRequest) -> Result<Verified, VerifyError> {
        (**self).verify_token(request).await
    }
}
