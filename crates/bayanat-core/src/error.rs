//! Error types for Bayanat Core.

use thiserror::Error;

/// Errors raised while building or decoding core primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid resource id: {0:?}")]
    InvalidResourceId(String),

    #[error("invalid actor id: {0:?}")]
    InvalidActorId(String),

    #[error("invalid ledger address: {0:?}")]
    InvalidLedgerAddress(String),

    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
