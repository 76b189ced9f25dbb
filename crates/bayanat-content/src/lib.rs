//! # Bayanat Content
//!
//! Content-addressed storage of dataset payloads.
//!
//! ## Overview
//!
//! A [`ContentResolver`] publishes a [`DatasetPayload`] to a set of
//! redundant [`ContentEndpoint`]s and returns a [`ContentRef`] derived from
//! the payload bytes. Fetching verifies the bytes against the reference
//! and validates the payload schema before returning it.
//!
//! ## Key Types
//!
//! - [`ContentRef`] - Locator of a stored payload
//! - [`DatasetPayload`] - Feature schema plus ordered rows
//! - [`ContentEndpoint`] - One endpoint of the store
//! - [`MemoryEndpoint`] - In-memory endpoint with shared replicas
//! - [`ContentResolver`] - Bounded, rotating publish and fetch
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bayanat_content::{ContentEndpoint, ContentResolver, DatasetPayload, MemoryEndpoint};
//! use bayanat_core::RetryPolicy;
//!
//! async fn example(payload: DatasetPayload) -> bayanat_content::Result<()> {
//!     let primary = MemoryEndpoint::new("primary");
//!     let backup = primary.replica("backup");
//!     let endpoints: Vec<Arc<dyn ContentEndpoint>> = vec![Arc::new(primary), Arc::new(backup)];
//!
//!     let resolver = ContentResolver::new(endpoints, RetryPolicy::default());
//!     let reference = resolver.publish(&payload).await?;
//!     assert_eq!(resolver.fetch(&reference).await?, payload);
//!     Ok(())
//! }
//! ```

pub mod endpoint;
pub mod error;
pub mod payload;
pub mod reference;
pub mod resolver;

pub use endpoint::{ContentEndpoint, MemoryEndpoint};
pub use error::{ContentError, Result};
pub use payload::{
    DatasetPayload, Feature, FeatureType, GeneratedRow, Row, DEFAULT_INPUT_FEATURE,
    DEFAULT_ROWS_PER_PAGE, GENERATED_OUTPUT_FEATURE,
};
pub use reference::ContentRef;
pub use resolver::ContentResolver;
