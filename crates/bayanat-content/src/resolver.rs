//! Content resolution across redundant endpoints.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use bayanat_core::{RetryPolicy, Transient};

use crate::endpoint::ContentEndpoint;
use crate::error::{ContentError, Result};
use crate::payload::DatasetPayload;
use crate::reference::ContentRef;

/// Publishes and fetches dataset payloads.
///
/// Attempt `i` of any operation goes to endpoint `i mod n`, so a budget of
/// at least `n` attempts tolerates any single endpoint being down. When
/// the budget runs out the operation fails with `ContentUnavailable`.
pub struct ContentResolver {
    endpoints: Vec<Arc<dyn ContentEndpoint>>,
    retry: RetryPolicy,
}

impl ContentResolver {
    /// Create a resolver over `endpoints`, tried in order.
    pub fn new(endpoints: Vec<Arc<dyn ContentEndpoint>>, retry: RetryPolicy) -> Self {
        Self { endpoints, retry }
    }

    /// Number of configured endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Validate and store `payload`, returning its content address.
    pub async fn publish(&self, payload: &DatasetPayload) -> Result<ContentRef> {
        payload.validate()?;
        let bytes = Bytes::from(payload.to_json()?);
        let reference = ContentRef::for_bytes(&bytes);
        let len = bytes.len();
        self.put(&reference, bytes).await?;
        info!(rows = payload.rows.len(), bytes = len, "payload published");
        debug!(reference = %reference, "payload address");
        Ok(reference)
    }

    /// Store `payload` under a reference assigned by an external store.
    ///
    /// Fails with `InvalidReference` when `reference` is a BLAKE3 address
    /// of different content.
    pub async fn publish_at(&self, reference: &ContentRef, payload: &DatasetPayload) -> Result<()> {
        payload.validate()?;
        let bytes = Bytes::from(payload.to_json()?);
        if !reference.matches(&bytes) {
            return Err(ContentError::InvalidReference(format!(
                "{} does not address this payload",
                reference
            )));
        }
        self.put(reference, bytes).await
    }

    /// Retrieve, verify and validate the payload at `reference`.
    ///
    /// A replica whose bytes do not hash to a BLAKE3 reference is skipped
    /// like an unreachable endpoint. Bytes that fail to parse, or parse
    /// into an invalid payload, fail with `SchemaViolation`.
    pub async fn fetch(&self, reference: &ContentRef) -> Result<DatasetPayload> {
        let bytes = self
            .with_endpoints("content.get", reference, |endpoint| {
                let reference = reference.clone();
                async move {
                    let bytes = endpoint.get(&reference).await?;
                    if !reference.matches(&bytes) {
                        return Err(ContentError::CorruptReplica {
                            endpoint: endpoint.name().to_string(),
                            reference,
                        });
                    }
                    Ok(bytes)
                }
            })
            .await?;

        let payload = DatasetPayload::from_json(&bytes)?;
        debug!(reference = %reference, rows = payload.rows.len(), "payload fetched");
        Ok(payload)
    }

    async fn put(&self, reference: &ContentRef, bytes: Bytes) -> Result<()> {
        self.with_endpoints("content.put", reference, |endpoint| {
            let reference = reference.clone();
            let bytes = bytes.clone();
            async move { endpoint.put(&reference, bytes).await }
        })
        .await
    }

    /// Run `op` against rotating endpoints under the retry policy.
    async fn with_endpoints<F, Fut, T>(&self, label: &str, reference: &ContentRef, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn ContentEndpoint>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if self.endpoints.is_empty() {
            return Err(ContentError::ContentUnavailable {
                reference: reference.clone(),
                attempts: 0,
                last_error: "no endpoints configured".into(),
            });
        }

        let attempts = AtomicU32::new(0);
        let result = self
            .retry
            .execute(label, |attempt| {
                attempts.fetch_add(1, Ordering::Relaxed);
                let endpoint = self.endpoints[attempt as usize % self.endpoints.len()].clone();
                op(endpoint)
            })
            .await;

        match result {
            Err(e) if e.is_transient() => {
                let attempts = attempts.load(Ordering::Relaxed);
                warn!(operation = label, attempts, error = %e, "content unavailable");
                Err(ContentError::ContentUnavailable {
                    reference: reference.clone(),
                    attempts,
                    last_error: e.to_string(),
                })
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::endpoint::MemoryEndpoint;
    use crate::payload::GeneratedRow;

    fn payload() -> DatasetPayload {
        let rows = vec![GeneratedRow {
            input: "q".into(),
            output: "a".into(),
            signature: "s".into(),
            response_hash: "h".into(),
            total_tokens: 3,
        }];
        DatasetPayload::from_generated(&rows, "").unwrap()
    }

    fn replicas() -> (Arc<MemoryEndpoint>, Arc<MemoryEndpoint>, Arc<MemoryEndpoint>) {
        let a = MemoryEndpoint::new("a");
        let b = a.replica("b");
        let c = a.replica("c");
        (Arc::new(a), Arc::new(b), Arc::new(c))
    }

    fn resolver(endpoints: &[&Arc<MemoryEndpoint>], attempts: u32) -> ContentResolver {
        ContentResolver::new(
            endpoints
                .iter()
                .map(|e| (*e).clone() as Arc<dyn ContentEndpoint>)
                .collect(),
            RetryPolicy::fixed(Duration::from_millis(10)).with_max_attempts(attempts),
        )
    }

    #[tokio::test]
    async fn test_publish_then_fetch() {
        let (a, b, c) = replicas();
        let resolver = resolver(&[&a, &b, &c], 3);

        let reference = resolver.publish(&payload()).await.unwrap();
        assert_eq!(resolver.fetch(&reference).await.unwrap(), payload());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_endpoint_down_is_tolerated() {
        let (a, b, c) = replicas();
        let resolver = resolver(&[&a, &b, &c], 3);
        let reference = resolver.publish(&payload()).await.unwrap();

        a.set_online(false);
        assert_eq!(resolver.fetch(&reference).await.unwrap(), payload());
        assert_eq!(a.requests(), 2);
        assert_eq!(b.requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_is_content_unavailable() {
        let (a, b, c) = replicas();
        let resolver = resolver(&[&a, &b, &c], 4);
        let reference = resolver.publish(&payload()).await.unwrap();

        for e in [&a, &b, &c] {
            e.set_online(false);
        }
        match resolver.fetch(&reference).await {
            Err(ContentError::ContentUnavailable { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("expected ContentUnavailable, got {:?}", other),
        }
        assert_eq!(a.requests(), 1 + 2);
    }

    #[tokio::test]
    async fn test_no_endpoints() {
        let resolver = ContentResolver::new(Vec::new(), RetryPolicy::default());
        let err = resolver.publish(&payload()).await.unwrap_err();
        assert!(matches!(err, ContentError::ContentUnavailable { attempts: 0, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_replicas_exhaust_budget() {
        let (a, b, _) = replicas();
        let resolver = resolver(&[&a, &b], 2);
        let reference = resolver.publish(&payload()).await.unwrap();

        a.corrupt(&reference, Bytes::from_static(b"{}"));
        let err = resolver.fetch(&reference).await.unwrap_err();
        assert!(matches!(err, ContentError::ContentUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_opaque_reference_schema_violation() {
        let (a, _, _) = replicas();
        let resolver = resolver(&[&a], 1);
        let reference = ContentRef::parse("cid:bafy123").unwrap();

        a.corrupt(&reference, Bytes::from_static(br#"{"features": []}"#));
        let err = resolver.fetch(&reference).await.unwrap_err();
        assert!(matches!(err, ContentError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn test_publish_at_checks_blake3_references() {
        let (a, _, _) = replicas();
        let resolver = resolver(&[&a], 1);

        let opaque = ContentRef::parse("cid:bafy123").unwrap();
        resolver.publish_at(&opaque, &payload()).await.unwrap();
        assert_eq!(resolver.fetch(&opaque).await.unwrap(), payload());

        let wrong = ContentRef::for_bytes(b"something else");
        assert!(matches!(
            resolver.publish_at(&wrong, &payload()).await,
            Err(ContentError::InvalidReference(_))
        ));
    }
}
