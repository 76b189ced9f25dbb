//! Storage endpoints.
//!
//! A content store is reached through several redundant endpoints. The
//! [`ContentEndpoint`] trait abstracts one of them; [`MemoryEndpoint`]
//! replicas share a blob map so tests can take individual endpoints
//! offline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{ContentError, Result};
use crate::reference::ContentRef;

/// One endpoint of a content-addressed store.
#[async_trait]
pub trait ContentEndpoint: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Store `bytes` under `reference`.
    async fn put(&self, reference: &ContentRef, bytes: Bytes) -> Result<()>;

    /// Retrieve the bytes stored under `reference`.
    async fn get(&self, reference: &ContentRef) -> Result<Bytes>;
}

type BlobMap = Arc<RwLock<HashMap<ContentRef, Bytes>>>;

/// In-memory endpoint.
pub struct MemoryEndpoint {
    name: String,
    blobs: BlobMap,
    online: AtomicBool,
    requests: AtomicU64,
}

impl MemoryEndpoint {
    /// A new endpoint with its own empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_blobs(name, BlobMap::default())
    }

    fn with_blobs(name: impl Into<String>, blobs: BlobMap) -> Self {
        Self {
            name: name.into(),
            blobs,
            online: AtomicBool::new(true),
            requests: AtomicU64::new(0),
        }
    }

    /// Another endpoint serving the same store.
    pub fn replica(&self, name: impl Into<String>) -> Self {
        Self::with_blobs(name, self.blobs.clone())
    }

    /// Take the endpoint offline or bring it back.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Requests received, including those refused while offline.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Overwrite a stored blob, bypassing the online check.
    pub fn corrupt(&self, reference: &ContentRef, bytes: Bytes) {
        if let Ok(mut blobs) = self.blobs.write() {
            blobs.insert(reference.clone(), bytes);
        }
    }

    fn check_online(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.online.load(Ordering::SeqCst) {
            return Err(self.unavailable("offline"));
        }
        Ok(())
    }

    fn unavailable(&self, reason: impl Into<String>) -> ContentError {
        ContentError::EndpointUnavailable {
            endpoint: self.name.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ContentEndpoint for MemoryEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, reference: &ContentRef, bytes: Bytes) -> Result<()> {
        self.check_online()?;
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| self.unavailable(format!("lock poisoned: {}", e)))?;
        blobs.insert(reference.clone(), bytes);
        Ok(())
    }

    async fn get(&self, reference: &ContentRef) -> Result<Bytes> {
        self.check_online()?;
        let blobs = self
            .blobs
            .read()
            .map_err(|e| self.unavailable(format!("lock poisoned: {}", e)))?;
        blobs
            .get(reference)
            .cloned()
            .ok_or_else(|| ContentError::BlobNotFound {
                endpoint: self.name.clone(),
                reference: reference.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replicas_share_blobs() {
        let a = MemoryEndpoint::new("a");
        let b = a.replica("b");
        let r = ContentRef::for_bytes(b"x");

        a.put(&r, Bytes::from_static(b"x")).await.unwrap();
        assert_eq!(b.get(&r).await.unwrap(), Bytes::from_static(b"x"));
    }

    #[tokio::test]
    async fn test_offline_endpoint_refuses() {
        let a = MemoryEndpoint::new("a");
        a.set_online(false);
        let r = ContentRef::for_bytes(b"x");
        assert!(matches!(
            a.get(&r).await,
            Err(ContentError::EndpointUnavailable { .. })
        ));
        assert_eq!(a.requests(), 1);

        a.set_online(true);
        assert!(matches!(
            a.get(&r).await,
            Err(ContentError::BlobNotFound { .. })
        ));
    }
}
