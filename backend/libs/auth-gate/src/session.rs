//! Store-backed session lifecycle.
//!
//! Credentials have the form `<subject_id>.<64 hex chars>`. Only this module
//! interprets that shape; the gate itself treats credentials as opaque.
//!
//! ## Keys
//!
//! - `v1:session:{subject}:{sha256(credential)}` holds a [`SessionRecord`]
//!   with the session TTL. Revoking a subject sweeps `v1:session:{subject}:`.
//! - `v1:rotation:{sha256(credential)}` is claimed by the single request that
//!   rotates a credential nearing expiry. It expires with the credential. A
//!   rotation that fails or is cancelled before the new credential exists
//!   releases the claim so a later request can rotate instead.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use session_store::{SessionKey, StoreError, TokenStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::AuthGateConfig;
use crate::error::SessionError;
use crate::verifier::{Verified, Verifier, VerifyError, VerifyRequest};

const ISSUE_ATTEMPTS: usize = 3;
const ROTATION_MARKER: &str = "rotating";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub subject_id: u64,
    /// Unix seconds
    pub issued_at: i64,
    /// Unix seconds
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    session_ttl: Duration,
    rotate_within: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn TokenStore>, config: &AuthGateConfig) -> Self {
        Self {
            store,
            session_ttl: config.session_ttl(),
            rotate_within: config.rotate_within(),
        }
    }

    /// Issue a fresh credential for `subject_id`.
    ///
    /// The session key is claimed rather than set, so a colliding credential
    /// can never overwrite someone else's session.
    pub async fn issue(&self, subject_id: u64) -> Result<String, SessionError> {
        let now = Utc::now().timestamp();
        let record = SessionRecord {
            subject_id,
            issued_at: now,
            expires_at: now + self.session_ttl.as_secs() as i64,
        };
        let value = serde_json::to_string(&record).map_err(StoreError::from)?;

        for _ in 0..ISSUE_ATTEMPTS {
            let credential = generate_credential(subject_id);
            let key = SessionKey::session(subject_id, &credential);
            if self.store.try_claim(&key, &value, self.session_ttl).await? {
                info!(subject_id, "Session issued");
                return Ok(credential);
            }
            warn!(subject_id, "Session credential collision, regenerating");
        }

        Err(SessionError::CredentialCollision)
    }

    /// Look up the live session behind a credential.
    pub async fn resolve(
        &self,
        credential: &str,
        subject_hint: Option<u64>,
    ) -> Result<SessionRecord, SessionError> {
        let subject_id = parse_subject(credential)?;
        if let Some(hint) = subject_hint {
            if hint != subject_id {
                warn!(subject_id, hint, "Subject hint does not match credential");
                return Err(SessionError::SubjectMismatch);
            }
        }

        let raw = match self
            .store
            .get(&SessionKey::session(subject_id, credential))
            .await
        {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => return Err(SessionError::UnknownSession),
            Err(e) => return Err(e.into()),
        };

        let record: SessionRecord = serde_json::from_str(&raw).map_err(StoreError::from)?;
        if record.subject_id != subject_id {
            return Err(SessionError::SubjectMismatch);
        }
        Ok(record)
    }

    /// Issue a replacement when the session is close to expiry.
    ///
    /// Only the request that wins the rotation claim gets a new credential;
    /// concurrent requests carrying the same credential get `None`. The old
    /// credential is left to expire on its own TTL. When issuing fails the
    /// claim is released before the error is returned.
    pub async fn rotate_if_due(
        &self,
        credential: &str,
        record: &SessionRecord,
    ) -> Result<Option<String>, SessionError> {
        let remaining = record.expires_at - Utc::now().timestamp();
        if remaining > self.rotate_within.as_secs() as i64 {
            return Ok(None);
        }

        let claim_key = SessionKey::rotation(credential);
        let claim_ttl = Duration::from_secs(remaining.max(1) as u64);
        let claimed = self
            .store
            .try_claim(&claim_key, ROTATION_MARKER, claim_ttl)
            .await?;
        if !claimed {
            debug!(subject_id = record.subject_id, "Credential already rotated");
            return Ok(None);
        }

        let claim = RotationClaim::new(self.store.clone(), claim_key);
        match self.issue(record.subject_id).await {
            Ok(fresh) => {
                claim.keep();
                info!(subject_id = record.subject_id, "Session rotated");
                Ok(Some(fresh))
            }
            Err(e) => {
                claim.release().await;
                Err(e)
            }
        }
    }

    /// Revoke one credential. Unknown credentials are ignored.
    pub async fn revoke(&self, credential: &str) -> Result<(), SessionError> {
        let subject_id = parse_subject(credential)?;
        self.store
            .delete(&SessionKey::session(subject_id, credential))
            .await?;
        self.store.delete(&SessionKey::rotation(credential)).await?;
        info!(subject_id, "Session revoked");
        Ok(())
    }

    /// Revoke every session of a subject. Returns how many were removed.
    pub async fn revoke_subject(&self, subject_id: u64) -> Result<usize, SessionError> {
        let revoked = self
            .store
            .delete_by_prefix(&SessionKey::subject_prefix(subject_id))
            .await?;
        warn!(subject_id, revoked, "All sessions revoked for subject");
        Ok(revoked)
    }
}

/// [`Verifier`] backed by [`SessionManager`].
#[derive(Clone)]
pub struct SessionVerifier {
    sessions: SessionManager,
}

impl SessionVerifier {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }
}

#[async_trait::async_trait]
impl Verifier for SessionVerifier {
    async fn verify_token(&self, request: VerifyRequest) -> Result<Verified, VerifyError> {
        let record = self
            .sessions
            .resolve(&request.credential, request.subject_hint)
            .await?;
        // The current request is already authenticated; a failed rotation is
        // retried by the next request carrying this credential.
        let rotated = match self
            .sessions
            .rotate_if_due(&request.credential, &record)
            .await
        {
            Ok(rotated) => rotated,
            Err(e) => {
                warn!(subject_id = record.subject_id, "Session rotation failed: {}", e);
                None
            }
        };

        Ok(Verified {
            subject_id: record.subject_id,
            rotated_credential: rotated,
        })
    }
}

/// Held rotation claim.
///
/// Dropped while still armed, e.g. when the verifying future is cancelled by
/// the gate's timeout, it schedules its own release on the current runtime.
struct RotationClaim {
    store: Arc<dyn TokenStore>,
    key: String,
    armed: bool,
}

impl RotationClaim {
    fn new(store: Arc<dyn TokenStore>, key: String) -> Self {
        Self {
            store,
            key,
            armed: true,
        }
    }

    /// The rotation went through; the claim stays until it expires.
    fn keep(mut self) {
        self.armed = false;
    }

    async fn release(mut self) {
        self.armed = false;
        if let Err(e) = self.store.delete(&self.key).await {
            error!("Failed to release rotation claim: {}", e);
        }
    }
}

impl Drop for RotationClaim {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.delete(&key).await {
                        error!("Failed to release abandoned rotation claim: {}", e);
                    }
                });
            }
            Err(_) => {
                warn!("No runtime to release abandoned rotation claim, it expires with the credential")
            }
        }
    }
}

fn generate_credential(subject_id: u64) -> String {
    let secret: [u8; 32] = rand::random();
    format!("{}.{}", subject_id, hex::encode(secret))
}

fn parse_subject(credential: &str) -> Result<u64, SessionError> {
    let (subject, secret) = credential
        .split_once('.')
        .ok_or(SessionError::MalformedCredential)?;
    if secret.len() != 64 || !secret.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(SessionError::MalformedCredential);
    }
    subject
        .parse()
        .map_err(|_| SessionError::MalformedCredential)
}
