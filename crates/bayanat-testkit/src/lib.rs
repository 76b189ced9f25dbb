//! # Bayanat Testkit
//!
//! Testing utilities for Bayanat.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Pinned canonical encodings of access predicates
//! - **Generators**: Proptest strategies for ids, references and rows
//! - **Fixtures**: An in-memory marketplace wired end to end
//!
//! ## Golden Vectors
//!
//! ```rust
//! use bayanat_testkit::vectors::verify_all_vectors;
//!
//! assert!(verify_all_vectors().is_empty());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use bayanat_testkit::generators::malformed_resource_id;
//!
//! proptest! {
//!     #[test]
//!     fn rejects_malformed_ids(id in malformed_resource_id()) {
//!         prop_assert!(bayanat_core::ResourceId::parse(&id).is_err());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use bayanat_testkit::fixtures::{sample_payload, MarketFixture};
//! use bayanat_core::Amount;
//!
//! async fn example() {
//!     let fixture = MarketFixture::new();
//!     let id = fixture.mint(Amount::from_whole(5)).await;
//!     fixture
//!         .orchestrator
//!         .lock(&fixture.producer_id(), id.as_str(), &sample_payload(3))
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    fast_config, sample_payload, sample_rows, FixtureNetwork, FixtureOrchestrator, MarketFixture,
    LEDGER_ADDRESS, START_MILLIS,
};
pub use vectors::{all_vectors, predicate_from_vector, verify_all_vectors, PredicateVector};
