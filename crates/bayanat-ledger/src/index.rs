//! Resource enumeration.
//!
//! The ledger's mint events are the primary index. Ledgers without an
//! event index are enumerated by scanning sequential ids, bounded by an
//! explicit [`ScanConfig`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use bayanat_core::{ActorId, ResourceId, Visibility};

use crate::client::LedgerClient;
use crate::error::{LedgerError, Result};
use crate::traits::LedgerBackend;
use crate::types::Resource;

/// Bounds for the sequential-id scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// First id probed.
    pub start: u64,
    /// Last id probed (inclusive).
    pub max_id: u64,
    /// Stop after this many consecutive missing ids.
    pub miss_limit: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start: 1,
            max_id: 1_000,
            miss_limit: 5,
        }
    }
}

/// How resource ids are discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Enumeration {
    /// Read the ledger's mint event index.
    #[default]
    EventIndex,
    /// Probe ids one by one.
    Scan(ScanConfig),
}

/// Lists resources known to a ledger.
pub struct ResourceIndex<B> {
    client: LedgerClient<B>,
    enumeration: Enumeration,
}

impl<B: LedgerBackend> ResourceIndex<B> {
    /// Create an index over the given client.
    pub fn new(client: LedgerClient<B>, enumeration: Enumeration) -> Self {
        Self {
            client,
            enumeration,
        }
    }

    /// Every resource the enumeration strategy finds, in id order.
    pub async fn all(&self) -> Result<Vec<Resource>> {
        match self.enumeration {
            Enumeration::EventIndex => {
                let ids = self.client.minted_resources().await?;
                let mut resources = Vec::with_capacity(ids.len());
                for id in &ids {
                    resources.push(self.client.query_resource(id).await?);
                }
                Ok(resources)
            }
            Enumeration::Scan(config) => self.scan(config).await,
        }
    }

    /// Public, locked resources: the marketplace listing.
    pub async fn locked(&self) -> Result<Vec<Resource>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|r| r.is_locked() && r.visibility == Visibility::Public)
            .collect())
    }

    /// Resources owned by `owner`, private ones included.
    pub async fn owned_by(&self, owner: &ActorId) -> Result<Vec<Resource>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|r| &r.owner == owner)
            .collect())
    }

    async fn scan(&self, config: ScanConfig) -> Result<Vec<Resource>> {
        let mut found = Vec::new();
        let mut misses = 0u32;

        for n in config.start..=config.max_id {
            match self.client.query_resource(&ResourceId::from(n)).await {
                Ok(resource) => {
                    misses = 0;
                    found.push(resource);
                }
                Err(LedgerError::ResourceNotFound(_)) => {
                    misses += 1;
                    if misses >= config.miss_limit {
                        debug!(last_probed = n, misses, "scan stopped on consecutive misses");
                        break;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bayanat_core::{Amount, LedgerAddress};
    use bytes::Bytes;

    use crate::memory::MemoryLedger;
    use crate::types::{MintParams, RawStorageInfo};

    fn actor(s: &str) -> ActorId {
        ActorId::parse(s).unwrap()
    }

    fn storage() -> RawStorageInfo {
        RawStorageInfo {
            encrypted_reference: Bytes::from_static(b"c"),
            data_hash: Bytes::from(vec![1u8; 32]),
            metadata: Default::default(),
        }
    }

    /// Mints five resources: 1 and 2 locked public, 3 locked private,
    /// 4 unlocked, 5 locked public by another owner.
    async fn populated() -> LedgerClient<MemoryLedger> {
        let backend = Arc::new(MemoryLedger::new(LedgerAddress::from_bytes([1; 20])));
        let alice = actor("0xa");
        let bob = actor("0xb");

        for (owner, visibility, lock) in [
            (&alice, Visibility::Public, true),
            (&alice, Visibility::Public, true),
            (&alice, Visibility::Private, true),
            (&alice, Visibility::Public, false),
            (&bob, Visibility::Public, true),
        ] {
            let id = backend
                .mint(owner, &MintParams::new("d", Amount::ZERO).with_visibility(visibility))
                .await
                .unwrap();
            if lock {
                backend.lock(owner, &id, &storage()).await.unwrap();
            }
        }

        LedgerClient::new(backend)
    }

    fn ids(resources: &[Resource]) -> Vec<&str> {
        resources.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_event_index_listing() {
        let index = ResourceIndex::new(populated().await, Enumeration::EventIndex);
        assert_eq!(ids(&index.locked().await.unwrap()), vec!["1", "2", "5"]);
        assert_eq!(
            ids(&index.owned_by(&actor("0xa")).await.unwrap()),
            vec!["1", "2", "3", "4"]
        );
    }

    #[tokio::test]
    async fn test_scan_matches_event_index() {
        let client = populated().await;
        let scan = ResourceIndex::new(client.clone(), Enumeration::Scan(ScanConfig::default()));
        let events = ResourceIndex::new(client, Enumeration::EventIndex);
        assert_eq!(scan.all().await.unwrap(), events.all().await.unwrap());
    }

    #[tokio::test]
    async fn test_scan_respects_bounds() {
        let client = populated().await;

        let capped = ResourceIndex::new(
            client.clone(),
            Enumeration::Scan(ScanConfig {
                start: 2,
                max_id: 3,
                miss_limit: 5,
            }),
        );
        assert_eq!(ids(&capped.all().await.unwrap()), vec!["2", "3"]);

        let index = ResourceIndex::new(
            client,
            Enumeration::Scan(ScanConfig {
                start: 6,
                max_id: u64::MAX,
                miss_limit: 3,
            }),
        );
        assert!(index.all().await.unwrap().is_empty());
    }
}
