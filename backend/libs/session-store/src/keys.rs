//! Session key schema
//!
//! Every component that touches session state must build keys here.
//! Key format: v{VERSION}:{group}:{identifier}[:sub_key]
//!
//! Credentials never appear in clear inside a key; they are hashed with
//! SHA-256 first so a keyspace dump does not leak live tokens.

use sha2::{Digest, Sha256};

/// Key schema version - increment when changing key formats
pub const KEY_VERSION: u32 = 1;

/// Session key builder
pub struct SessionKey;

impl SessionKey {
    /// Session entry for one credential
    /// Format: v1:session:{subject_id}:{sha256(credential)}
    pub fn session(subject_id: u64, credential: &str) -> String {
        format!(
            "{}{}",
            Self::subject_prefix(subject_id),
            hash_credential(credential)
        )
    }

    /// Revocation group for every session of a subject.
    ///
    /// The trailing separator keeps subject 4 from matching subject 42.
    pub fn subject_prefix(subject_id: u64) -> String {
        format!("v{}:session:{}:", KEY_VERSION, subject_id)
    }

    /// Single-rotation claim for a credential
    /// Format: v1:rotation:{sha256(credential)}
    pub fn rotation(credential: &str) -> String {
        format!("v{}:rotation:{}", KEY_VERSION, hash_credential(credential))
    }
}

/// Hex-encoded SHA-256 of a credential
pub fn hash_credential(credential: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(credential.as_bytes());
    hex::encode(hasher.finalize())
}
