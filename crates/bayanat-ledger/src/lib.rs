//! # Bayanat Ledger
//!
//! Client for the marketplace ledger that gates access to resources.
//!
//! ## Overview
//!
//! The ledger contract is abstracted behind the [`LedgerBackend`] trait,
//! which mirrors the contract's entry points. [`LedgerClient`] layers the
//! caller-facing conventions on top: sentinel records become
//! `ResourceNotFound`, transient failures are retried, and permission
//! checks are never cached.
//!
//! ## Key Types
//!
//! - [`LedgerBackend`] - The marketplace contract surface
//! - [`MemoryLedger`] - In-memory ledger with fault injection, for tests
//! - [`SqliteLedger`] - SQLite-backed ledger for local deployments
//! - [`LedgerClient`] - Register, check permission, query resources
//! - [`ResourceIndex`] - Enumerate resources by event index or id scan
//! - [`PredicateEvaluator`] - Evaluates bound access predicates
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bayanat_core::{ActorId, Amount, LedgerAddress};
//! use bayanat_ledger::{LedgerClient, MintParams, SqliteLedger};
//!
//! async fn example() -> bayanat_ledger::Result<()> {
//!     let backend = SqliteLedger::open("ledger.db", LedgerAddress::from_bytes([1; 20]))?;
//!     let client = LedgerClient::new(Arc::new(backend));
//!
//!     let owner = ActorId::parse("0xa")?;
//!     let id = client.mint(&owner, &MintParams::new("reviews", Amount::from_whole(5))).await?;
//!     assert!(!client.check_permission(&id, &owner).await?); // not locked yet
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod index;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use client::LedgerClient;
pub use error::{LedgerError, Result};
pub use index::{Enumeration, ResourceIndex, ScanConfig};
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;
pub use traits::{LedgerBackend, PredicateEvaluator};
pub use types::{
    LockMetadata, MintParams, ModelMetadata, RawStorageInfo, Resource, ResourceCore,
    SourceDataset, StorageRecord,
};
