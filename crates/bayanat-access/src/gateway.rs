//! Encryption and decryption gateways.
//!
//! The gateways are the client side of the encryption network. They own
//! the session lifecycle, the retry budget and the local integrity checks;
//! the network owns enforcement.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use bayanat_core::{Blake3Hash, Clock, Predicate, RetryPolicy};

use crate::error::{AccessError, Result};
use crate::network::{DecryptRequest, EncryptionNetwork};
use crate::session::{SessionConfig, SessionMessage, SessionProof, SessionSigner};

/// A reference sealed under a predicate, with its hash commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Bytes,
    /// BLAKE3 of the plaintext reference.
    pub hash: Blake3Hash,
}

fn predicate_bytes(predicate: &Predicate) -> Result<Vec<u8>> {
    predicate
        .validate()
        .and_then(|_| predicate.canonical_bytes())
        .map_err(|e| AccessError::PredicateRejected(e.to_string()))
}

/// Run `op` under `retry` against a live session.
///
/// Each attempt reconnects first if the session is down, so a session
/// dropped between attempts is re-established before the call is retried.
/// A budget spent without a session surfaces as `EncryptionUnavailable`.
async fn with_session<N, F, Fut, T>(
    network: &N,
    retry: &RetryPolicy,
    label: &str,
    op: F,
) -> Result<T>
where
    N: EncryptionNetwork + ?Sized,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let op = &op;
    retry
        .execute(label, move |attempt| async move {
            if !network.is_connected() {
                if attempt > 0 {
                    debug!(operation = label, attempt, "reconnecting to encryption network");
                }
                network.connect().await?;
            }
            op().await
        })
        .await
        .map_err(|e| match e {
            AccessError::NotConnected => {
                AccessError::EncryptionUnavailable(format!("session lost during {}", label))
            }
            other => other,
        })
}

/// Seals references under access predicates.
pub struct EncryptionGateway<N> {
    network: Arc<N>,
    retry: RetryPolicy,
}

impl<N: EncryptionNetwork> EncryptionGateway<N> {
    /// Create a gateway. No connection is made until the first call.
    pub fn new(network: Arc<N>, retry: RetryPolicy) -> Self {
        Self { network, retry }
    }

    /// Seal `plaintext` under `predicate`.
    ///
    /// Fails with `PredicateRejected` for a malformed predicate and with
    /// `EncryptionUnavailable` once the retry budget is spent.
    pub async fn encrypt(&self, plaintext: &str, predicate: &Predicate) -> Result<Sealed> {
        let bytes = predicate_bytes(predicate)?;
        let ciphertext = with_session(self.network.as_ref(), &self.retry, "network.encrypt", || {
            self.network.encrypt(plaintext.as_bytes(), &bytes)
        })
        .await?;

        debug!(ciphertext_len = ciphertext.len(), "reference sealed");
        Ok(Sealed {
            ciphertext,
            hash: Blake3Hash::hash(plaintext.as_bytes()),
        })
    }

    /// Tear down the network session.
    pub async fn disconnect(&self) -> Result<()> {
        self.network.disconnect().await
    }
}

/// Reopens sealed references for one actor.
pub struct DecryptionGateway<N, S> {
    network: Arc<N>,
    signer: S,
    clock: Arc<dyn Clock>,
    session: SessionConfig,
    retry: RetryPolicy,
}

impl<N: EncryptionNetwork, S: SessionSigner> DecryptionGateway<N, S> {
    /// Create a gateway acting for `signer`.
    pub fn new(
        network: Arc<N>,
        signer: S,
        clock: Arc<dyn Clock>,
        session: SessionConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            network,
            signer,
            clock,
            session,
            retry,
        }
    }

    /// The signer this gateway acts for.
    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Open a fresh session: fetch a nonce and have the signer sign.
    pub async fn authenticate(&self) -> Result<SessionProof> {
        let nonce = with_session(self.network.as_ref(), &self.retry, "network.latest_nonce", || {
            self.network.latest_nonce()
        })
        .await?;

        let issued_at = self.clock.now_millis();
        let ttl = self.session.effective_ttl().as_millis() as i64;
        let message = SessionMessage {
            actor: self.signer.actor(),
            network: self.network.network_id().to_string(),
            resource: self.session.resource.clone(),
            ability: self.session.ability.clone(),
            nonce,
            issued_at,
            expires_at: issued_at.saturating_add(ttl),
        };

        let proof = SessionProof::issue(&self.signer, message)?;
        info!(actor = %proof.actor(), expires_at = proof.expires_at(), "session opened");
        Ok(proof)
    }

    /// Reopen `ciphertext` and check it against `hash`.
    ///
    /// The network re-evaluates `predicate` for the proof's actor on every
    /// call. A proof that expires before the result arrives invalidates the
    /// result: the caller must authenticate again.
    pub async fn decrypt(
        &self,
        ciphertext: &Bytes,
        hash: &Blake3Hash,
        predicate: &Predicate,
        proof: &SessionProof,
    ) -> Result<String> {
        proof.check_expiry(self.clock.now_millis())?;
        let request = DecryptRequest {
            ciphertext: ciphertext.clone(),
            predicate: predicate_bytes(predicate)?,
            proof: proof.clone(),
        };

        let plaintext = with_session(self.network.as_ref(), &self.retry, "network.decrypt", || {
            self.network.decrypt(&request)
        })
        .await?;

        proof.check_expiry(self.clock.now_millis())?;

        let actual = Blake3Hash::hash(&plaintext);
        if &actual != hash {
            return Err(AccessError::IntegrityViolation {
                expected: *hash,
                actual,
            });
        }

        String::from_utf8(plaintext)
            .map_err(|_| AccessError::CorruptCiphertext("reference is not UTF-8".into()))
    }
}
