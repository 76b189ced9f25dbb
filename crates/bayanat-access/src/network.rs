//! The encryption network.
//!
//! [`EncryptionNetwork`] is the session-based encrypt/decrypt service the
//! gateways talk to. [`LocalNetwork`] runs the whole protocol in process:
//! its nodes each evaluate the access predicate against the ledger, and a
//! reference is only reopened when a threshold of them approve.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use bayanat_core::{decode_predicate, Blake3Hash, BoundPredicate, Clock, Predicate};
use bayanat_ledger::{LedgerError, PredicateEvaluator};

use crate::crypto::{X25519PublicKey, X25519StaticSecret};
use crate::envelope::SealedEnvelope;
use crate::error::{AccessError, Result};
use crate::session::SessionProof;

/// Encryption network parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network identifier session proofs are bound to.
    pub network_id: String,
    /// Chain whose ledger predicates are evaluated against.
    pub chain: String,
    /// Number of nodes evaluating each decryption request.
    pub nodes: u32,
    /// Approvals required to reopen a reference.
    pub threshold: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_id: "datil-dev".to_string(),
            chain: "filecoinCalibrationTestnet".to_string(),
            nodes: 3,
            threshold: 2,
        }
    }
}

impl NetworkConfig {
    /// Set the node count and threshold.
    pub fn with_quorum(mut self, threshold: u32, nodes: u32) -> Self {
        self.threshold = threshold;
        self.nodes = nodes;
        self
    }

    /// Threshold clamped to `1..=nodes`.
    pub fn effective_threshold(&self) -> u32 {
        self.threshold.clamp(1, self.nodes.max(1))
    }
}

/// A request to reopen a sealed reference.
#[derive(Debug, Clone)]
pub struct DecryptRequest {
    /// Sealed envelope bytes as stored on the ledger.
    pub ciphertext: Bytes,
    /// Canonical bytes of the predicate the reference was sealed under.
    pub predicate: Vec<u8>,
    /// The requesting actor's session proof.
    pub proof: SessionProof,
}

/// A session-based, predicate-gated encryption service.
///
/// # Design Notes
///
/// - **Explicit lifecycle**: every call except `connect` fails with
///   `NotConnected` until `connect` succeeds.
/// - **Enforcement lives here**: `decrypt` re-evaluates the predicate
///   against current ledger state on every call.
#[async_trait]
pub trait EncryptionNetwork: Send + Sync {
    /// Identifier session proofs must name.
    fn network_id(&self) -> &str;

    /// Whether a session is established.
    fn is_connected(&self) -> bool;

    /// Establish a session.
    async fn connect(&self) -> Result<()>;

    /// Tear down the session.
    async fn disconnect(&self) -> Result<()>;

    /// A fresh nonce for session messages.
    async fn latest_nonce(&self) -> Result<String>;

    /// Seal `plaintext` under the predicate encoded by `predicate`.
    async fn encrypt(&self, plaintext: &[u8], predicate: &[u8]) -> Result<Bytes>;

    /// Reopen a sealed reference if the predicate holds for the proof's actor.
    async fn decrypt(&self, request: &DecryptRequest) -> Result<Vec<u8>>;
}

/// An in-process encryption network.
pub struct LocalNetwork<E> {
    config: NetworkConfig,
    secret: X25519StaticSecret,
    evaluator: Arc<E>,
    clock: Arc<dyn Clock>,
    connected: AtomicBool,
    pending_connect_failures: AtomicU32,
    epoch: AtomicU64,
}

impl<E: PredicateEvaluator> LocalNetwork<E> {
    /// Create a network with a freshly generated key.
    pub fn new(config: NetworkConfig, evaluator: Arc<E>, clock: Arc<dyn Clock>) -> Self {
        Self::with_secret(config, evaluator, clock, X25519StaticSecret::generate())
    }

    /// Create a network with a given key.
    pub fn with_secret(
        config: NetworkConfig,
        evaluator: Arc<E>,
        clock: Arc<dyn Clock>,
        secret: X25519StaticSecret,
    ) -> Self {
        Self {
            config,
            secret,
            evaluator,
            clock,
            connected: AtomicBool::new(false),
            pending_connect_failures: AtomicU32::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    /// The network's public sealing key.
    pub fn public_key(&self) -> X25519PublicKey {
        self.secret.public_key()
    }

    /// The network configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.pending_connect_failures.store(n, Ordering::SeqCst);
    }

    fn require_connected(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(AccessError::NotConnected);
        }
        Ok(())
    }

    /// Decode and check a predicate the way every node does on receipt.
    fn accept_predicate(&self, bytes: &[u8]) -> Result<Predicate> {
        let predicate =
            decode_predicate(bytes).map_err(|e| AccessError::PredicateRejected(e.to_string()))?;
        predicate
            .validate()
            .map_err(|e| AccessError::PredicateRejected(e.to_string()))?;
        if predicate.chain != self.config.chain {
            return Err(AccessError::PredicateRejected(format!(
                "unknown chain {:?}",
                predicate.chain
            )));
        }
        Ok(predicate)
    }

    /// Ask every node to evaluate the predicate; returns the approval count.
    async fn approvals(&self, bound: &BoundPredicate) -> Result<u32> {
        let mut approvals = 0;
        for node in 0..self.config.nodes {
            let granted = match self.evaluator.evaluate(bound).await {
                Ok(granted) => granted,
                Err(LedgerError::UnsupportedPredicate(reason)) => {
                    return Err(AccessError::PredicateRejected(reason))
                }
                Err(e) => return Err(e.into()),
            };
            debug!(node, resource = %bound.resource_id, actor = %bound.actor, granted, "node evaluated predicate");
            if granted {
                approvals += 1;
            }
        }
        Ok(approvals)
    }
}

#[async_trait]
impl<E: PredicateEvaluator> EncryptionNetwork for LocalNetwork<E> {
    fn network_id(&self) -> &str {
        &self.config.network_id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<()> {
        let injected = self
            .pending_connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(AccessError::EncryptionUnavailable(
                "handshake with network nodes failed".into(),
            ));
        }

        if !self.connected.swap(true, Ordering::SeqCst) {
            info!(network = %self.config.network_id, nodes = self.config.nodes, "connected to encryption network");
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!(network = %self.config.network_id, "disconnected from encryption network");
        }
        Ok(())
    }

    async fn latest_nonce(&self) -> Result<String> {
        self.require_connected()?;
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst);

        let mut hasher = blake3::Hasher::new();
        hasher.update(self.config.network_id.as_bytes());
        hasher.update(&epoch.to_be_bytes());
        hasher.update(&self.clock.now_millis().to_be_bytes());
        Ok(hex::encode(&hasher.finalize().as_bytes()[..16]))
    }

    async fn encrypt(&self, plaintext: &[u8], predicate: &[u8]) -> Result<Bytes> {
        self.require_connected()?;
        self.accept_predicate(predicate)?;

        let envelope = SealedEnvelope::seal(plaintext, predicate, &self.public_key())?;
        Ok(Bytes::from(envelope.to_bytes()?))
    }

    async fn decrypt(&self, request: &DecryptRequest) -> Result<Vec<u8>> {
        self.require_connected()?;
        let predicate = self.accept_predicate(&request.predicate)?;
        request
            .proof
            .verify(&self.config.network_id, self.clock.now_millis())?;

        let envelope = SealedEnvelope::from_bytes(&request.ciphertext)?;
        if Blake3Hash::hash(&request.predicate) != envelope.predicate_digest {
            return Err(AccessError::PredicateRejected(
                "predicate does not match the sealed reference".into(),
            ));
        }

        let bound = predicate.bind(request.proof.actor())?;
        let approvals = self.approvals(&bound).await?;
        let threshold = self.config.effective_threshold();
        if approvals < threshold {
            warn!(resource = %bound.resource_id, actor = %bound.actor, approvals, threshold, "decryption refused");
            return Err(AccessError::PermissionDenied {
                resource_id: bound.resource_id,
                actor: bound.actor,
            });
        }

        envelope.open(&request.predicate, &self.secret)
    }
}
