//! # Bayanat Core
//!
//! Pure primitives for access-gated content resolution: identifiers,
//! digests, signing keys, access predicates and their canonical encoding.
//!
//! This crate performs no network I/O. The only async code is the retry
//! helper, which sleeps between attempts of a caller-supplied operation.
//!
//! ## Key Types
//!
//! - [`ResourceId`] - Canonical decimal identifier of a ledger resource
//! - [`ActorId`] - `0x`-prefixed identifier of a requesting actor
//! - [`Predicate`] - Declarative access condition evaluated on the ledger
//! - [`ConditionEncoder`] - Builds canonical predicates for a ledger
//! - [`Blake3Hash`] - Hash commitments and content addresses
//! - [`RetryPolicy`] - Bounded retry with backoff for transient failures
//!
//! ## Canonicalization
//!
//! Predicates and session messages are encoded using deterministic CBOR.
//! See the [`canonical`] module.

pub mod canonical;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod predicate;
pub mod retry;
pub mod types;

pub use canonical::{decode_predicate, encode_canonical, predicate_bytes};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, Result};
pub use predicate::{
    BoundPredicate, ConditionEncoder, Predicate, ReturnValueTest, ACTOR_PLACEHOLDER,
    PERMISSION_METHOD,
};
pub use retry::{BackoffStrategy, RetryPolicy, Transient};
pub use types::{ActorId, Amount, LedgerAddress, ResourceId, Visibility};
