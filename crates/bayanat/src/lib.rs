//! # Bayanat
//!
//! Access-gated content resolution: lock a dataset behind a ledger
//! permission predicate and resolve it for actors the ledger permits.
//!
//! ## Overview
//!
//! A producer publishes a dataset to a content-addressed store, seals the
//! resulting reference under a predicate naming the ledger's permission
//! check, and registers the sealed reference on the ledger. A consumer
//! later proves its identity with a short-lived session, and the
//! encryption network reopens the reference only if the ledger still
//! grants access. The consumer then fetches and validates the dataset.
//!
//! ## Workflows
//!
//! | Path    | Steps                                                       |
//! |---------|-------------------------------------------------------------|
//! | Lock    | publish → build predicate → encrypt → register              |
//! | Unlock  | check permission → decrypt → verify hash → fetch → validate |
//!
//! Every failure is reported as one [`ResolutionError`] kind, so hosts can
//! render an actionable message instead of a generic failure.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bayanat::{ResolutionOrchestrator, ResolverConfig};
//! use bayanat::access::LocalNetwork;
//! use bayanat::content::{ContentEndpoint, DatasetPayload, MemoryEndpoint};
//! use bayanat::core::{Keypair, LedgerAddress, SystemClock};
//! use bayanat::ledger::{LedgerClient, MemoryLedger};
//! use bayanat::SessionSigner;
//!
//! async fn example(payload: DatasetPayload) -> bayanat::Result<()> {
//!     let config = ResolverConfig::default();
//!     let ledger = Arc::new(MemoryLedger::new(LedgerAddress::from_bytes([1; 20])));
//!     let clock = Arc::new(SystemClock);
//!     let network = Arc::new(LocalNetwork::new(
//!         config.network.clone(),
//!         Arc::new(LedgerClient::new(ledger.clone())),
//!         clock.clone(),
//!     ));
//!     let endpoints: Vec<Arc<dyn ContentEndpoint>> = vec![Arc::new(MemoryEndpoint::new("a"))];
//!     let orchestrator = ResolutionOrchestrator::new(ledger, network, endpoints, clock, config);
//!
//!     let producer = Keypair::generate();
//!     // mint resource 1 for producer.actor() on the ledger, then:
//!     orchestrator.lock(&producer.actor(), "1", &payload).await?;
//!     let resolved = orchestrator.unlock("1", &producer).await?;
//!     assert_eq!(resolved.payload, payload);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `bayanat::core` - Identifiers, predicates, retry policy
//! - `bayanat::ledger` - Ledger client and backends
//! - `bayanat::access` - Encryption and decryption gateways
//! - `bayanat::content` - Content store and dataset payloads

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use bayanat_access as access;
pub use bayanat_content as content;
pub use bayanat_core as core;
pub use bayanat_ledger as ledger;

pub use config::ResolverConfig;
pub use error::{ErrorKind, ResolutionError, Result};
pub use orchestrator::{LockReceipt, Resolution, ResolutionOrchestrator};
pub use state::{LockState, Trace, UnlockState};

pub use bayanat_access::{SessionProof, SessionSigner};
pub use bayanat_content::{ContentRef, DatasetPayload, GeneratedRow};
pub use bayanat_core::{ActorId, Keypair, Predicate, ResourceId};
