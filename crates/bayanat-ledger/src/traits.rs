//! Ledger traits: the marketplace contract surface and predicate evaluation.
//!
//! [`LedgerBackend`] mirrors the marketplace contract's entry points one to
//! one, including its sentinel conventions (version-0 core records, empty
//! storage records). Implementations include an in-memory ledger for tests
//! and a SQLite ledger for local deployments; an RPC-backed implementation
//! lives in the host application.

use async_trait::async_trait;

use bayanat_core::{ActorId, Amount, BoundPredicate, LedgerAddress, ResourceId, Visibility};

use crate::error::Result;
use crate::types::{MintParams, RawStorageInfo, ResourceCore};

/// The marketplace contract.
///
/// # Design Notes
///
/// - **Sentinels, not errors, on reads**: `get_core` returns
///   [`ResourceCore::empty`] and `get_storage_info` returns an empty
///   [`RawStorageInfo`] for unknown or unlocked resources, exactly like the
///   contract's view functions.
/// - **Errors on writes**: mutating calls against unknown resources fail
///   with `ResourceNotFound`; a second `lock` fails with `AlreadyLocked`.
/// - **No caching**: `can_decrypt` must read current state on every call.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Address the contract is deployed at.
    fn address(&self) -> LedgerAddress;

    // ─────────────────────────────────────────────────────────────────────────
    // Views
    // ─────────────────────────────────────────────────────────────────────────

    /// Core record, or the version-0 sentinel.
    async fn get_core(&self, id: &ResourceId) -> Result<ResourceCore>;

    /// Storage record, or an empty record when not locked.
    async fn get_storage_info(&self, id: &ResourceId) -> Result<RawStorageInfo>;

    /// Whether `actor` may decrypt the resource's storage record.
    async fn can_decrypt(&self, id: &ResourceId, actor: &ActorId) -> Result<bool>;

    /// Ids from the contract's mint events, in mint order.
    async fn minted_resources(&self) -> Result<Vec<ResourceId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────

    /// Mint a new resource owned by `caller`.
    async fn mint(&self, caller: &ActorId, params: &MintParams) -> Result<ResourceId>;

    /// Attach a storage record. Owner only, once.
    async fn lock(&self, caller: &ActorId, id: &ResourceId, storage: &RawStorageInfo)
        -> Result<()>;

    /// Pay for access and join the allowlist.
    async fn purchase(&self, caller: &ActorId, id: &ResourceId, payment: Amount) -> Result<()>;

    /// Change the listing visibility. Owner only.
    async fn set_visibility(
        &self,
        caller: &ActorId,
        id: &ResourceId,
        visibility: Visibility,
    ) -> Result<()>;

    /// Change the price. Owner only.
    async fn set_price(&self, caller: &ActorId, id: &ResourceId, price: Amount) -> Result<()>;

    /// Remove `actor` from the allowlist. Owner only.
    async fn revoke(&self, caller: &ActorId, id: &ResourceId, actor: &ActorId) -> Result<()>;
}

/// Evaluates bound access predicates against current ledger state.
///
/// Encryption-network nodes hold one of these and consult it independently
/// before contributing to a decryption.
#[async_trait]
pub trait PredicateEvaluator: Send + Sync {
    /// Evaluate the predicate for its bound actor.
    async fn evaluate(&self, predicate: &BoundPredicate) -> Result<bool>;
}
