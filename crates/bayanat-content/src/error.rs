//! Error types for the content module.

use bayanat_core::Transient;
use thiserror::Error;

use crate::reference::ContentRef;

/// Errors that can occur while publishing or fetching content.
#[derive(Debug, Error)]
pub enum ContentError {
    /// An endpoint could not be reached.
    #[error("endpoint {endpoint} unavailable: {reason}")]
    EndpointUnavailable { endpoint: String, reason: String },

    /// An endpoint does not hold the blob. Another replica may.
    #[error("endpoint {endpoint} has no blob {reference}")]
    BlobNotFound {
        endpoint: String,
        reference: ContentRef,
    },

    /// An endpoint returned bytes that do not hash to the reference.
    #[error("endpoint {endpoint} returned a corrupt replica of {reference}")]
    CorruptReplica {
        endpoint: String,
        reference: ContentRef,
    },

    /// Every attempt across every endpoint failed.
    #[error("content {reference} unavailable after {attempts} attempts: {last_error}")]
    ContentUnavailable {
        reference: ContentRef,
        attempts: u32,
        last_error: String,
    },

    /// The payload does not have the expected shape.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A reference string is malformed.
    #[error("invalid content reference: {0:?}")]
    InvalidReference(String),

    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Transient for ContentError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            ContentError::EndpointUnavailable { .. }
                | ContentError::BlobNotFound { .. }
                | ContentError::CorruptReplica { .. }
        )
    }
}

/// Result type for content operations.
pub type Result<T> = std::result::Result<T, ContentError>;
