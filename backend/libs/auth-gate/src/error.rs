//! Gate and session error types
//!
//! `AuthError` is what reaches the HTTP boundary. Every variant rejects the
//! request before business handlers run.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use session_store::StoreError;
use thiserror::Error;

use crate::verifier::VerifyError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Required header missing or unparsable.
    #[error("Malformed credentials: {0}")]
    Malformed(String),

    /// The verifier rejected the credential.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Authentication backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Identity read on a request that never passed the gate.
    #[error("No identity attached to request")]
    IdentityMissing,

    #[error("Identity already attached to request")]
    IdentityAlreadyAttached,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Malformed(_) => "MALFORMED_CREDENTIALS",
            AuthError::Unauthenticated(_) => "UNAUTHENTICATED",
            AuthError::BackendUnavailable(_) => "AUTH_BACKEND_UNAVAILABLE",
            AuthError::IdentityMissing | AuthError::IdentityAlreadyAttached => {
                "AUTH_CONTEXT_ERROR"
            }
        }
    }

    /// Metrics label
    pub fn outcome(&self) -> &'static str {
        match self {
            AuthError::Malformed(_) => "malformed",
            AuthError::Unauthenticated(_) => "unauthenticated",
            AuthError::BackendUnavailable(_) => "backend_unavailable",
            AuthError::IdentityMissing | AuthError::IdentityAlreadyAttached => "context_error",
        }
    }

    fn public_message(&self) -> String {
        match self {
            AuthError::Malformed(msg) => msg.clone(),
            AuthError::Unauthenticated(_) => "Invalid, expired, or revoked credential".to_string(),
            AuthError::BackendUnavailable(_) => {
                "Authentication temporarily unavailable".to_string()
            }
            AuthError::IdentityMissing | AuthError::IdentityAlreadyAttached => {
                "Internal server error".to_string()
            }
        }
    }
}

impl From<VerifyError> for AuthError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Rejected(reason) => AuthError::Unauthenticated(reason),
            VerifyError::Unavailable(reason) => AuthError::BackendUnavailable(reason),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    code: &'static str,
    message: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Malformed(_) => StatusCode::BAD_REQUEST,
            AuthError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AuthError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::IdentityMissing | AuthError::IdentityAlreadyAttached => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorBody {
            status: status.as_u16(),
            code: self.code(),
            message: self.public_message(),
            timestamp: chrono::Utc::now(),
        })
    }
}

/// Failures of the store-backed session lifecycle.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Malformed credential")]
    MalformedCredential,

    #[error("Unknown or expired session")]
    UnknownSession,

    #[error("Credential does not belong to subject")]
    SubjectMismatch,

    #[error("Could not allocate a unique credential")]
    CredentialCollision,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SessionError> for VerifyError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Store(store_err) => VerifyError::from(store_err),
            SessionError::CredentialCollision => {
                VerifyError::Unavailable(SessionError::CredentialCollision.to_string())
            }
            other => VerifyError::Rejected(other.to_string()),
        }
    }
}
