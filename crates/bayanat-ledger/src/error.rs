//! Error types for the ledger module.

use bayanat_core::{ActorId, CoreError, ResourceId, Transient};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No resource exists under this id (the ledger returned a version-0 record).
    #[error("resource not found: {0}")]
    ResourceNotFound(ResourceId),

    /// The resource exists but has no storage record attached yet.
    #[error("resource {0} is not locked")]
    NotLocked(ResourceId),

    /// A storage record is already attached to this resource.
    #[error("resource {0} is already locked")]
    AlreadyLocked(ResourceId),

    /// The caller is not the owner of the resource.
    #[error("{caller} is not the owner of resource {resource_id}")]
    NotOwner {
        resource_id: ResourceId,
        caller: ActorId,
    },

    /// The resource cannot be purchased (private or not yet locked).
    #[error("resource {0} is not for sale")]
    NotForSale(ResourceId),

    /// The payment does not cover the price.
    #[error("payment of {offered} does not cover price {price} of resource {resource_id}")]
    InsufficientPayment {
        resource_id: ResourceId,
        price: bayanat_core::Amount,
        offered: bayanat_core::Amount,
    },

    /// A predicate names a ledger or entry point this ledger does not serve.
    #[error("unsupported predicate: {0}")]
    UnsupportedPredicate(String),

    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl Transient for LedgerError {
    fn is_transient(&self) -> bool {
        match self {
            LedgerError::Unavailable(_) => true,
            LedgerError::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
