//! High-level ledger client.
//!
//! Wraps a [`LedgerBackend`] with the conventions callers rely on:
//! sentinel records become `ResourceNotFound`, transient failures are
//! retried under a bounded [`RetryPolicy`], and permission checks always
//! go to the ledger.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use bayanat_core::{
    ActorId, Amount, BoundPredicate, LedgerAddress, ResourceId, RetryPolicy, Visibility,
    PERMISSION_METHOD,
};

use crate::error::{LedgerError, Result};
use crate::traits::{LedgerBackend, PredicateEvaluator};
use crate::types::{MintParams, RawStorageInfo, Resource, ResourceCore, StorageRecord};

/// Client for the marketplace ledger.
///
/// Cheap to clone; clones share the backend.
pub struct LedgerClient<B> {
    backend: Arc<B>,
    retry: RetryPolicy,
}

impl<B> Clone for LedgerClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<B: LedgerBackend> LedgerClient<B> {
    /// Create a client with the default retry policy.
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_retry(backend, RetryPolicy::default())
    }

    /// Create a client with an explicit retry policy.
    pub fn with_retry(backend: Arc<B>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// The ledger's address.
    pub fn address(&self) -> LedgerAddress {
        self.backend.address()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Storage records
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach a storage record to a resource.
    ///
    /// Fails with `AlreadyLocked` if a record is already attached, leaving
    /// it untouched. A retry whose earlier attempt did land is detected by
    /// comparing the stored record with ours and reported as success.
    pub async fn register(&self, caller: &ActorId, record: &StorageRecord) -> Result<()> {
        let id = &record.resource_id;
        let raw = RawStorageInfo {
            encrypted_reference: record.ciphertext.clone(),
            data_hash: Bytes::copy_from_slice(record.hash.as_bytes()),
            metadata: record.metadata,
        };
        let raw = &raw;
        let backend = &self.backend;

        self.retry
            .execute("ledger.register", |attempt| async move {
                match backend.lock(caller, id, raw).await {
                    Err(LedgerError::AlreadyLocked(_)) if attempt > 0 => {
                        if &backend.get_storage_info(id).await? == raw {
                            debug!(resource = %id, attempt, "earlier register attempt landed");
                            Ok(())
                        } else {
                            Err(LedgerError::AlreadyLocked(id.clone()))
                        }
                    }
                    other => other,
                }
            })
            .await?;

        info!(resource = %id, owner = %caller, "storage record registered");
        Ok(())
    }

    /// The storage record of a locked resource.
    ///
    /// Fails with `ResourceNotFound` for unknown ids and `NotLocked` when
    /// the resource exists but has nothing attached.
    pub async fn storage_record(&self, id: &ResourceId) -> Result<StorageRecord> {
        let raw = self
            .retry
            .execute("ledger.get_storage_info", |_| {
                self.backend.get_storage_info(id)
            })
            .await?;

        if raw.is_empty() {
            self.core(id).await?;
            return Err(LedgerError::NotLocked(id.clone()));
        }

        let hash = bayanat_core::Blake3Hash::from_slice(&raw.data_hash).map_err(|_| {
            LedgerError::InvalidData(format!(
                "resource {} has a {}-byte hash commitment",
                id,
                raw.data_hash.len()
            ))
        })?;

        Ok(StorageRecord {
            resource_id: id.clone(),
            ciphertext: raw.encrypted_reference,
            hash,
            metadata: raw.metadata,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `actor` may currently decrypt the resource.
    ///
    /// Always a fresh ledger read.
    pub async fn check_permission(&self, id: &ResourceId, actor: &ActorId) -> Result<bool> {
        let granted = self
            .retry
            .execute("ledger.can_decrypt", |_| self.backend.can_decrypt(id, actor))
            .await?;
        debug!(resource = %id, actor = %actor, granted, "permission checked");
        Ok(granted)
    }

    /// Owner of the resource.
    pub async fn query_owner(&self, id: &ResourceId) -> Result<ActorId> {
        Ok(self.core(id).await?.owner)
    }

    /// Current price of the resource.
    pub async fn query_price(&self, id: &ResourceId) -> Result<Amount> {
        Ok(self.core(id).await?.price)
    }

    /// Listing visibility of the resource.
    pub async fn query_visibility(&self, id: &ResourceId) -> Result<Visibility> {
        Ok(self.core(id).await?.visibility)
    }

    /// Full view of a resource, including lock statistics.
    pub async fn query_resource(&self, id: &ResourceId) -> Result<Resource> {
        let core = self.core(id).await?;
        let storage = self
            .retry
            .execute("ledger.get_storage_info", |_| {
                self.backend.get_storage_info(id)
            })
            .await?;
        Ok(Resource::from_parts(id.clone(), core, &storage))
    }

    /// Ids from the ledger's mint events.
    pub async fn minted_resources(&self) -> Result<Vec<ResourceId>> {
        self.retry
            .execute("ledger.minted_resources", |_| self.backend.minted_resources())
            .await
    }

    async fn core(&self, id: &ResourceId) -> Result<ResourceCore> {
        let core = self
            .retry
            .execute("ledger.get_core", |_| self.backend.get_core(id))
            .await?;
        if core.is_empty() {
            return Err(LedgerError::ResourceNotFound(id.clone()));
        }
        Ok(core)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Marketplace transactions
    // ─────────────────────────────────────────────────────────────────────────

    /// Mint a new resource owned by `caller`.
    ///
    /// Not retried: a lost response may still have minted.
    pub async fn mint(&self, caller: &ActorId, params: &MintParams) -> Result<ResourceId> {
        let id = self.backend.mint(caller, params).await?;
        info!(resource = %id, owner = %caller, name = %params.name, "resource minted");
        Ok(id)
    }

    /// Buy access to a resource.
    pub async fn purchase(&self, buyer: &ActorId, id: &ResourceId, payment: Amount) -> Result<()> {
        self.retry
            .execute("ledger.purchase", |_| self.backend.purchase(buyer, id, payment))
            .await?;
        info!(resource = %id, buyer = %buyer, %payment, "access purchased");
        Ok(())
    }

    /// Change the listing visibility.
    pub async fn set_visibility(
        &self,
        caller: &ActorId,
        id: &ResourceId,
        visibility: Visibility,
    ) -> Result<()> {
        self.retry
            .execute("ledger.set_visibility", |_| {
                self.backend.set_visibility(caller, id, visibility)
            })
            .await
    }

    /// Change the price.
    pub async fn set_price(&self, caller: &ActorId, id: &ResourceId, price: Amount) -> Result<()> {
        self.retry
            .execute("ledger.set_price", |_| self.backend.set_price(caller, id, price))
            .await
    }

    /// Remove `actor` from the resource's allowlist.
    pub async fn revoke(&self, caller: &ActorId, id: &ResourceId, actor: &ActorId) -> Result<()> {
        self.retry
            .execute("ledger.revoke", |_| self.backend.revoke(caller, id, actor))
            .await?;
        info!(resource = %id, actor = %actor, "access revoked");
        Ok(())
    }
}

#[async_trait]
impl<B: LedgerBackend> PredicateEvaluator for LedgerClient<B> {
    async fn evaluate(&self, predicate: &BoundPredicate) -> Result<bool> {
        if predicate.ledger != self.address() {
            return Err(LedgerError::UnsupportedPredicate(format!(
                "predicate targets ledger {}, this ledger is {}",
                predicate.ledger,
                self.address()
            )));
        }
        if predicate.method != PERMISSION_METHOD {
            return Err(LedgerError::UnsupportedPredicate(format!(
                "unknown entry point {:?}",
                predicate.method
            )));
        }

        let granted = self
            .check_permission(&predicate.resource_id, &predicate.actor)
            .await?;
        Ok(predicate.return_value_test.accepts(granted))
    }
}
