//! Error types for the access module.

use bayanat_core::{ActorId, Blake3Hash, CoreError, ResourceId, Transient};
use bayanat_ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur while sealing or opening gated references.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The predicate is malformed or does not match the ciphertext.
    #[error("predicate rejected: {0}")]
    PredicateRejected(String),

    /// No session with the encryption network could be established.
    #[error("encryption network unavailable: {0}")]
    EncryptionUnavailable(String),

    /// The network is not connected.
    #[error("not connected to encryption network")]
    NotConnected,

    /// Too few nodes found the predicate satisfied for this actor.
    #[error("permission denied: {actor} may not decrypt resource {resource_id}")]
    PermissionDenied {
        resource_id: ResourceId,
        actor: ActorId,
    },

    /// The session proof expired before the operation completed.
    #[error("session expired at {expires_at} (now {now})")]
    SessionExpired { expires_at: i64, now: i64 },

    /// The session proof is not valid for this network or signer.
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// The recovered plaintext does not match its hash commitment.
    #[error("integrity violation: expected {expected}, recovered {actual}")]
    IntegrityViolation {
        expected: Blake3Hash,
        actual: Blake3Hash,
    },

    /// The ciphertext could not be parsed or authenticated.
    #[error("corrupt ciphertext: {0}")]
    CorruptCiphertext(String),

    /// Encryption primitive failure.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// A node's ledger read failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl Transient for AccessError {
    fn is_transient(&self) -> bool {
        match self {
            AccessError::EncryptionUnavailable(_) | AccessError::NotConnected => true,
            AccessError::Ledger(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;
