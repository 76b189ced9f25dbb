//! In-memory implementation of the LedgerBackend trait.
//!
//! This is primarily for testing. It enforces the same rules as the
//! marketplace contract but keeps everything in memory. Fault injection
//! hooks let tests simulate an unreachable ledger.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use bayanat_core::{ActorId, Amount, LedgerAddress, ResourceId, Visibility};

use crate::error::{LedgerError, Result};
use crate::traits::LedgerBackend;
use crate::types::{MintParams, RawStorageInfo, ResourceCore};

/// In-memory ledger.
///
/// All data is lost when the ledger is dropped. Thread-safe via RwLock.
pub struct MemoryLedger {
    address: LedgerAddress,
    inner: RwLock<MemoryLedgerInner>,
    available: AtomicBool,
    pending_failures: AtomicU32,
    permission_checks: AtomicU64,
}

#[derive(Default)]
struct MemoryLedgerInner {
    /// Records indexed by numeric id.
    records: HashMap<u64, StoredResource>,

    /// Mint order (the contract's event log).
    minted: Vec<u64>,

    /// Last assigned id.
    last_id: u64,
}

struct StoredResource {
    core: ResourceCore,
    storage: RawStorageInfo,
    allowlist: BTreeSet<ActorId>,
}

impl MemoryLedger {
    /// Create an empty ledger deployed at `address`.
    pub fn new(address: LedgerAddress) -> Self {
        Self {
            address,
            inner: RwLock::new(MemoryLedgerInner::default()),
            available: AtomicBool::new(true),
            pending_failures: AtomicU32::new(0),
            permission_checks: AtomicU64::new(0),
        }
    }

    /// Make every call fail with `Unavailable` until re-enabled.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make the next `n` calls fail with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    /// Number of `can_decrypt` calls served so far.
    pub fn permission_checks(&self) -> u64 {
        self.permission_checks.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("ledger offline".into()));
        }
        let consumed = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(LedgerError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryLedgerInner>> {
        self.check_available()?;
        self.inner
            .read()
            .map_err(|e| LedgerError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryLedgerInner>> {
        self.check_available()?;
        self.inner
            .write()
            .map_err(|e| LedgerError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl MemoryLedgerInner {
    fn get(&self, id: &ResourceId) -> Option<&StoredResource> {
        id.as_u64().and_then(|n| self.records.get(&n))
    }

    fn get_mut(&mut self, id: &ResourceId) -> Result<&mut StoredResource> {
        id.as_u64()
            .and_then(|n| self.records.get_mut(&n))
            .ok_or_else(|| LedgerError::ResourceNotFound(id.clone()))
    }

    fn owned_mut(&mut self, caller: &ActorId, id: &ResourceId) -> Result<&mut StoredResource> {
        let record = self.get_mut(id)?;
        if &record.core.owner != caller {
            return Err(LedgerError::NotOwner {
                resource_id: id.clone(),
                caller: caller.clone(),
            });
        }
        Ok(record)
    }
}

#[async_trait]
impl LedgerBackend for MemoryLedger {
    fn address(&self) -> LedgerAddress {
        self.address
    }

    async fn get_core(&self, id: &ResourceId) -> Result<ResourceCore> {
        let inner = self.read()?;
        Ok(inner
            .get(id)
            .map(|r| r.core.clone())
            .unwrap_or_else(ResourceCore::empty))
    }

    async fn get_storage_info(&self, id: &ResourceId) -> Result<RawStorageInfo> {
        let inner = self.read()?;
        Ok(inner.get(id).map(|r| r.storage.clone()).unwrap_or_default())
    }

    async fn can_decrypt(&self, id: &ResourceId, actor: &ActorId) -> Result<bool> {
        self.permission_checks.fetch_add(1, Ordering::SeqCst);
        let inner = self.read()?;
        let record = inner
            .get(id)
            .ok_or_else(|| LedgerError::ResourceNotFound(id.clone()))?;

        if record.storage.is_empty() {
            return Ok(false);
        }
        Ok(&record.core.owner == actor || record.allowlist.contains(actor))
    }

    async fn minted_resources(&self) -> Result<Vec<ResourceId>> {
        let inner = self.read()?;
        Ok(inner.minted.iter().map(|&n| ResourceId::from(n)).collect())
    }

    async fn mint(&self, caller: &ActorId, params: &MintParams) -> Result<ResourceId> {
        let mut inner = self.write()?;
        inner.last_id += 1;
        let n = inner.last_id;

        inner.records.insert(
            n,
            StoredResource {
                core: ResourceCore::minted(caller.clone(), params),
                storage: RawStorageInfo::default(),
                allowlist: BTreeSet::new(),
            },
        );
        inner.minted.push(n);

        Ok(ResourceId::from(n))
    }

    async fn lock(
        &self,
        caller: &ActorId,
        id: &ResourceId,
        storage: &RawStorageInfo,
    ) -> Result<()> {
        if storage.is_empty() || storage.data_hash.len() != 32 {
            return Err(LedgerError::InvalidData(
                "storage record needs a ciphertext and a 32-byte hash".into(),
            ));
        }

        let mut inner = self.write()?;
        let record = inner.owned_mut(caller, id)?;
        if !record.storage.is_empty() {
            return Err(LedgerError::AlreadyLocked(id.clone()));
        }
        record.storage = storage.clone();
        Ok(())
    }

    async fn purchase(&self, caller: &ActorId, id: &ResourceId, payment: Amount) -> Result<()> {
        let mut inner = self.write()?;
        let record = inner.get_mut(id)?;

        if record.storage.is_empty() || record.core.visibility == Visibility::Private {
            return Err(LedgerError::NotForSale(id.clone()));
        }
        if &record.core.owner == caller || record.allowlist.contains(caller) {
            return Ok(());
        }
        if payment < record.core.price {
            return Err(LedgerError::InsufficientPayment {
                resource_id: id.clone(),
                price: record.core.price,
                offered: payment,
            });
        }

        record.allowlist.insert(caller.clone());
        record.core.downloads += 1;
        record.core.balance = record.core.balance.saturating_add(record.core.price);
        Ok(())
    }

    async fn set_visibility(
        &self,
        caller: &ActorId,
        id: &ResourceId,
        visibility: Visibility,
    ) -> Result<()> {
        let mut inner = self.write()?;
        inner.owned_mut(caller, id)?.core.visibility = visibility;
        Ok(())
    }

    async fn set_price(&self, caller: &ActorId, id: &ResourceId, price: Amount) -> Result<()> {
        let mut inner = self.write()?;
        inner.owned_mut(caller, id)?.core.price = price;
        Ok(())
    }

    async fn revoke(&self, caller: &ActorId, id: &ResourceId, actor: &ActorId) -> Result<()> {
        let mut inner = self.write()?;
        inner.owned_mut(caller, id)?.allowlist.remove(actor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn ledger() -> MemoryLedger {
        MemoryLedger::new(LedgerAddress::from_bytes([0x0b; 20]))
    }

    fn actor(s: &str) -> ActorId {
        ActorId::parse(s).unwrap()
    }

    fn storage() -> RawStorageInfo {
        RawStorageInfo {
            encrypted_reference: Bytes::from_static(b"ciphertext"),
            data_hash: Bytes::from(vec![7u8; 32]),
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_mint_assigns_sequential_ids() {
        let ledger = ledger();
        let owner = actor("0xa");
        let a = ledger.mint(&owner, &MintParams::new("a", Amount::ZERO)).await.unwrap();
        let b = ledger.mint(&owner, &MintParams::new("b", Amount::ZERO)).await.unwrap();
        assert_eq!(a.as_str(), "1");
        assert_eq!(b.as_str(), "2");
        assert_eq!(ledger.minted_resources().await.unwrap(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_unknown_id_returns_sentinel() {
        let ledger = ledger();
        let core = ledger.get_core(&ResourceId::from(99u64)).await.unwrap();
        assert!(core.is_empty());
        assert!(ledger
            .get_storage_info(&ResourceId::from(99u64))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_lock_twice_fails() {
        let ledger = ledger();
        let owner = actor("0xa");
        let id = ledger.mint(&owner, &MintParams::new("a", Amount::ZERO)).await.unwrap();
        ledger.lock(&owner, &id, &storage()).await.unwrap();

        let mut other = storage();
        other.encrypted_reference = Bytes::from_static(b"other");
        let err = ledger.lock(&owner, &id, &other).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyLocked(_)));
        assert_eq!(ledger.get_storage_info(&id).await.unwrap(), storage());
    }

    #[tokio::test]
    async fn test_lock_by_non_owner_fails() {
        let ledger = ledger();
        let id = ledger
            .mint(&actor("0xa"), &MintParams::new("a", Amount::ZERO))
            .await
            .unwrap();
        let err = ledger.lock(&actor("0xb"), &id, &storage()).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotOwner { .. }));
    }

    #[tokio::test]
    async fn test_purchase_grants_access() {
        let ledger = ledger();
        let owner = actor("0xa");
        let buyer = actor("0xb");
        let id = ledger
            .mint(&owner, &MintParams::new("a", Amount::from_whole(2)))
            .await
            .unwrap();
        ledger.lock(&owner, &id, &storage()).await.unwrap();

        assert!(!ledger.can_decrypt(&id, &buyer).await.unwrap());
        let err = ledger.purchase(&buyer, &id, Amount::from_whole(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientPayment { .. }));

        ledger.purchase(&buyer, &id, Amount::from_whole(2)).await.unwrap();
        assert!(ledger.can_decrypt(&id, &buyer).await.unwrap());

        let core = ledger.get_core(&id).await.unwrap();
        assert_eq!(core.downloads, 1);
        assert_eq!(core.balance, Amount::from_whole(2));

        // Buying again is a no-op.
        ledger.purchase(&buyer, &id, Amount::from_whole(2)).await.unwrap();
        assert_eq!(ledger.get_core(&id).await.unwrap().downloads, 1);
    }

    #[tokio::test]
    async fn test_private_and_unlocked_not_for_sale() {
        let ledger = ledger();
        let owner = actor("0xa");
        let id = ledger
            .mint(
                &owner,
                &MintParams::new("a", Amount::ZERO).with_visibility(Visibility::Private),
            )
            .await
            .unwrap();
        let err = ledger.purchase(&actor("0xb"), &id, Amount::ZERO).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotForSale(_)));

        ledger.lock(&owner, &id, &storage()).await.unwrap();
        let err = ledger.purchase(&actor("0xb"), &id, Amount::ZERO).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotForSale(_)));
    }

    #[tokio::test]
    async fn test_revoke_removes_access() {
        let ledger = ledger();
        let owner = actor("0xa");
        let buyer = actor("0xb");
        let id = ledger.mint(&owner, &MintParams::new("a", Amount::ZERO)).await.unwrap();
        ledger.lock(&owner, &id, &storage()).await.unwrap();
        ledger.purchase(&buyer, &id, Amount::ZERO).await.unwrap();
        assert!(ledger.can_decrypt(&id, &buyer).await.unwrap());

        ledger.revoke(&owner, &id, &buyer).await.unwrap();
        assert!(!ledger.can_decrypt(&id, &buyer).await.unwrap());
        assert!(ledger.can_decrypt(&id, &owner).await.unwrap());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let ledger = ledger();
        ledger.fail_next(2);
        assert!(matches!(
            ledger.minted_resources().await,
            Err(LedgerError::Unavailable(_))
        ));
        assert!(ledger.minted_resources().await.is_err());
        assert!(ledger.minted_resources().await.is_ok());

        ledger.set_available(false);
        assert!(ledger.minted_resources().await.is_err());
    }
}
