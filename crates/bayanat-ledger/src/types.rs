//! Ledger record types.
//!
//! These mirror what the marketplace ledger stores per resource: a core
//! record (ownership, pricing, listing) and, once locked, a storage record
//! holding the encrypted reference and its hash commitment.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use bayanat_core::{ActorId, Amount, Blake3Hash, ResourceId, Visibility};

/// Source dataset the generated rows were derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDataset {
    pub path: String,
    pub config: String,
    pub split: String,
    pub revision: String,
}

/// Inference model that generated the rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub task_small_id: u64,
    pub node_small_id: u64,
    pub price_per_million_compute_units: u64,
    pub max_compute_units: u64,
}

/// Parameters for minting a new resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintParams {
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
    pub price: Amount,
    pub source: SourceDataset,
    pub model: ModelMetadata,
}

impl MintParams {
    /// Minimal parameters: a public resource with the given name and price.
    pub fn new(name: impl Into<String>, price: Amount) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            visibility: Visibility::Public,
            price,
            source: SourceDataset::default(),
            model: ModelMetadata::default(),
        }
    }

    /// Set the visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The core record as returned by the ledger.
///
/// A `version` of 0 is the ledger's "no such resource" sentinel; the
/// [`LedgerClient`](crate::LedgerClient) never hands such a record to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCore {
    pub version: u32,
    pub owner: ActorId,
    pub price: Amount,
    pub visibility: Visibility,
    pub balance: Amount,
    pub downloads: u64,
    pub name: String,
    pub description: String,
    pub source: SourceDataset,
    pub model: ModelMetadata,
}

impl ResourceCore {
    /// The empty record returned for ids that were never minted.
    pub fn empty() -> Self {
        Self {
            version: 0,
            owner: ActorId::zero(),
            price: Amount::ZERO,
            visibility: Visibility::Public,
            balance: Amount::ZERO,
            downloads: 0,
            name: String::new(),
            description: String::new(),
            source: SourceDataset::default(),
            model: ModelMetadata::default(),
        }
    }

    /// A fresh version-1 record for a newly minted resource.
    pub fn minted(owner: ActorId, params: &MintParams) -> Self {
        Self {
            version: 1,
            owner,
            price: params.price,
            visibility: params.visibility,
            balance: Amount::ZERO,
            downloads: 0,
            name: params.name.clone(),
            description: params.description.clone(),
            source: params.source.clone(),
            model: params.model.clone(),
        }
    }

    /// Whether this is the sentinel record.
    pub fn is_empty(&self) -> bool {
        self.version == 0
    }
}

/// Size statistics recorded when a resource is locked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMetadata {
    pub num_rows: u64,
    pub num_tokens: u64,
}

/// Storage fields as returned by the ledger. Empty bytes mean "not locked".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStorageInfo {
    pub encrypted_reference: Bytes,
    pub data_hash: Bytes,
    pub metadata: LockMetadata,
}

impl RawStorageInfo {
    /// Whether the ledger returned an empty storage record.
    pub fn is_empty(&self) -> bool {
        self.encrypted_reference.is_empty()
    }
}

/// A storage record attached to a locked resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    pub resource_id: ResourceId,
    /// Encrypted reference, opaque to the ledger.
    pub ciphertext: Bytes,
    /// Hash commitment of the plaintext reference.
    pub hash: Blake3Hash,
    pub metadata: LockMetadata,
}

/// A resource as seen by callers of the ledger client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: ResourceId,
    pub version: u32,
    pub owner: ActorId,
    pub visibility: Visibility,
    pub price: Amount,
    pub balance: Amount,
    pub downloads: u64,
    pub name: String,
    pub description: String,
    pub source: SourceDataset,
    pub model: ModelMetadata,
    /// Lock statistics, present once a storage record is attached.
    pub locked: Option<LockMetadata>,
}

impl Resource {
    /// Assemble from the ledger's core and storage records.
    pub fn from_parts(id: ResourceId, core: ResourceCore, storage: &RawStorageInfo) -> Self {
        Self {
            id,
            version: core.version,
            owner: core.owner,
            visibility: core.visibility,
            price: core.price,
            balance: core.balance,
            downloads: core.downloads,
            name: core.name,
            description: core.description,
            source: core.source,
            model: core.model,
            locked: (!storage.is_empty()).then_some(storage.metadata),
        }
    }

    /// Whether a storage record is attached.
    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }
}
