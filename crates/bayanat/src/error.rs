//! Error types for resolution workflows.
//!
//! Every failure a workflow can report is one of the [`ResolutionError`]
//! variants below. Component errors are mapped into them by the `From`
//! impls; nothing is collapsed into a catch-all, so a host can render a
//! specific message for each kind.

use bayanat_access::AccessError;
use bayanat_content::ContentError;
use bayanat_core::{CoreError, Transient};
use bayanat_ledger::LedgerError;
use thiserror::Error;

/// Errors that can end a lock or unlock workflow.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The resource id is not a non-negative integer.
    #[error("invalid resource id: {0}")]
    InvalidResourceId(String),

    /// The access predicate is malformed or names an unknown ledger.
    #[error("predicate rejected: {0}")]
    PredicateRejected(String),

    /// No session with the encryption network within the retry budget.
    #[error("encryption unavailable: {0}")]
    EncryptionUnavailable(String),

    /// The resource already has a storage record.
    #[error("already locked: {0}")]
    AlreadyLocked(String),

    /// The ledger has no such resource, or nothing is locked under it.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// The ledger could not be reached within the retry budget.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// The ledger does not let this actor perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The session proof expired; authenticate again and start over.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// The recovered reference does not match its hash commitment.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// No content endpoint served the payload within the retry budget.
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    /// The payload does not have the dataset shape.
    #[error("schema violation: {0}")]
    SchemaViolation(String),
}

/// Discriminant of a [`ResolutionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidResourceId,
    PredicateRejected,
    EncryptionUnavailable,
    AlreadyLocked,
    ResourceNotFound,
    LedgerUnavailable,
    PermissionDenied,
    SessionExpired,
    IntegrityViolation,
    ContentUnavailable,
    SchemaViolation,
}

impl ErrorKind {
    /// Kinds caused by an unreachable collaborator. A later workflow may
    /// succeed; the current one already spent its retry budget.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::EncryptionUnavailable
                | ErrorKind::LedgerUnavailable
                | ErrorKind::ContentUnavailable
        )
    }
}

impl ResolutionError {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolutionError::InvalidResourceId(_) => ErrorKind::InvalidResourceId,
            ResolutionError::PredicateRejected(_) => ErrorKind::PredicateRejected,
            ResolutionError::EncryptionUnavailable(_) => ErrorKind::EncryptionUnavailable,
            ResolutionError::AlreadyLocked(_) => ErrorKind::AlreadyLocked,
            ResolutionError::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            ResolutionError::LedgerUnavailable(_) => ErrorKind::LedgerUnavailable,
            ResolutionError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ResolutionError::SessionExpired(_) => ErrorKind::SessionExpired,
            ResolutionError::IntegrityViolation(_) => ErrorKind::IntegrityViolation,
            ResolutionError::ContentUnavailable(_) => ErrorKind::ContentUnavailable,
            ResolutionError::SchemaViolation(_) => ErrorKind::SchemaViolation,
        }
    }
}

impl Transient for ResolutionError {
    fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

impl From<CoreError> for ResolutionError {
    fn from(e: CoreError) -> Self {
        let msg = e.to_string();
        match e {
            CoreError::InvalidResourceId(_) => ResolutionError::InvalidResourceId(msg),
            CoreError::InvalidActorId(_) => ResolutionError::PermissionDenied(msg),
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                ResolutionError::SessionExpired(msg)
            }
            CoreError::InvalidLedgerAddress(_)
            | CoreError::InvalidPredicate(_)
            | CoreError::EncodingError(_)
            | CoreError::DecodingError(_) => ResolutionError::PredicateRejected(msg),
        }
    }
}

impl From<LedgerError> for ResolutionError {
    fn from(e: LedgerError) -> Self {
        let msg = e.to_string();
        match e {
            LedgerError::ResourceNotFound(_) | LedgerError::NotLocked(_) => {
                ResolutionError::ResourceNotFound(msg)
            }
            LedgerError::AlreadyLocked(_) => ResolutionError::AlreadyLocked(msg),
            LedgerError::NotOwner { .. }
            | LedgerError::NotForSale(_)
            | LedgerError::InsufficientPayment { .. } => ResolutionError::PermissionDenied(msg),
            LedgerError::UnsupportedPredicate(_) => ResolutionError::PredicateRejected(msg),
            LedgerError::Core(inner) => inner.into(),
            LedgerError::Unavailable(_)
            | LedgerError::Database(_)
            | LedgerError::InvalidData(_)
            | LedgerError::Migration(_) => ResolutionError::LedgerUnavailable(msg),
        }
    }
}

impl From<AccessError> for ResolutionError {
    fn from(e: AccessError) -> Self {
        let msg = e.to_string();
        match e {
            AccessError::PredicateRejected(_) => ResolutionError::PredicateRejected(msg),
            AccessError::EncryptionUnavailable(_)
            | AccessError::NotConnected
            | AccessError::Encryption(_) => ResolutionError::EncryptionUnavailable(msg),
            AccessError::PermissionDenied { .. } => ResolutionError::PermissionDenied(msg),
            AccessError::SessionExpired { .. } | AccessError::InvalidSession(_) => {
                ResolutionError::SessionExpired(msg)
            }
            AccessError::IntegrityViolation { .. } | AccessError::CorruptCiphertext(_) => {
                ResolutionError::IntegrityViolation(msg)
            }
            AccessError::Ledger(inner) => inner.into(),
            AccessError::Core(inner) => inner.into(),
        }
    }
}

impl From<ContentError> for ResolutionError {
    fn from(e: ContentError) -> Self {
        let msg = e.to_string();
        match e {
            ContentError::EndpointUnavailable { .. }
            | ContentError::BlobNotFound { .. }
            | ContentError::CorruptReplica { .. }
            | ContentError::ContentUnavailable { .. } => ResolutionError::ContentUnavailable(msg),
            ContentError::SchemaViolation(_)
            | ContentError::InvalidReference(_)
            | ContentError::Serialization(_) => ResolutionError::SchemaViolation(msg),
        }
    }
}

/// Result type for resolution workflows.
pub type Result<T> = std::result::Result<T, ResolutionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bayanat_core::{ActorId, Blake3Hash, ResourceId};

    fn id() -> ResourceId {
        ResourceId::from(42u64)
    }

    #[test]
    fn test_ledger_mapping() {
        let cases = [
            (LedgerError::ResourceNotFound(id()), ErrorKind::ResourceNotFound),
            (LedgerError::NotLocked(id()), ErrorKind::ResourceNotFound),
            (LedgerError::AlreadyLocked(id()), ErrorKind::AlreadyLocked),
            (
                LedgerError::NotOwner {
                    resource_id: id(),
                    caller: ActorId::zero(),
                },
                ErrorKind::PermissionDenied,
            ),
            (LedgerError::Unavailable("down".into()), ErrorKind::LedgerUnavailable),
            (
                LedgerError::UnsupportedPredicate("other ledger".into()),
                ErrorKind::PredicateRejected,
            ),
            (
                LedgerError::Core(CoreError::InvalidResourceId("x".into())),
                ErrorKind::InvalidResourceId,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(ResolutionError::from(err).kind(), kind);
        }
    }

    #[test]
    fn test_access_mapping_keeps_integrity_distinct() {
        let integrity = AccessError::IntegrityViolation {
            expected: Blake3Hash::hash(b"a"),
            actual: Blake3Hash::hash(b"b"),
        };
        assert_eq!(
            ResolutionError::from(integrity).kind(),
            ErrorKind::IntegrityViolation
        );

        let denied = AccessError::PermissionDenied {
            resource_id: id(),
            actor: ActorId::zero(),
        };
        assert_eq!(ResolutionError::from(denied).kind(), ErrorKind::PermissionDenied);

        let expired = AccessError::SessionExpired {
            expires_at: 1,
            now: 2,
        };
        assert_eq!(ResolutionError::from(expired).kind(), ErrorKind::SessionExpired);

        let nested = AccessError::Ledger(LedgerError::Unavailable("rpc".into()));
        assert_eq!(ResolutionError::from(nested).kind(), ErrorKind::LedgerUnavailable);
    }

    #[test]
    fn test_content_mapping() {
        assert_eq!(
            ResolutionError::from(ContentError::SchemaViolation("no rows".into())).kind(),
            ErrorKind::SchemaViolation
        );
        assert_eq!(
            ResolutionError::from(ContentError::EndpointUnavailable {
                endpoint: "a".into(),
                reason: "offline".into(),
            })
            .kind(),
            ErrorKind::ContentUnavailable
        );
    }

    #[test]
    fn test_transient_kinds() {
        let transient: Vec<_> = [
            ErrorKind::InvalidResourceId,
            ErrorKind::PredicateRejected,
            ErrorKind::EncryptionUnavailable,
            ErrorKind::AlreadyLocked,
            ErrorKind::ResourceNotFound,
            ErrorKind::LedgerUnavailable,
            ErrorKind::PermissionDenied,
            ErrorKind::SessionExpired,
            ErrorKind::IntegrityViolation,
            ErrorKind::ContentUnavailable,
            ErrorKind::SchemaViolation,
        ]
        .into_iter()
        .filter(|k| k.is_transient())
        .collect();
        assert_eq!(
            transient,
            [
                ErrorKind::EncryptionUnavailable,
                ErrorKind::LedgerUnavailable,
                ErrorKind::ContentUnavailable
            ]
        );
    }
}
