//! Session proofs.
//!
//! An actor proves its identity to the encryption network with a signed,
//! short-lived [`SessionMessage`]. The signature comes from a
//! [`SessionSigner`] supplied by the host (a wallet, a test keypair).

use std::time::Duration;

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use bayanat_core::{encode_canonical, ActorId, Ed25519PublicKey, Ed25519Signature, Keypair};

use crate::error::{AccessError, Result};

/// Longest validity window a session proof may carry.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(10 * 60);

/// Ability requested by decryption sessions.
pub const DECRYPTION_ABILITY: &str = "access-control-condition-decryption";

/// Session parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Validity window. Capped at [`MAX_SESSION_TTL`].
    pub ttl: Duration,
    /// Resource pattern the session covers.
    pub resource: String,
    /// Ability the session grants.
    pub ability: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: MAX_SESSION_TTL,
            resource: "*".to_string(),
            ability: DECRYPTION_ABILITY.to_string(),
        }
    }
}

impl SessionConfig {
    /// Set the validity window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The validity window actually used.
    pub fn effective_ttl(&self) -> Duration {
        self.ttl.min(MAX_SESSION_TTL)
    }
}

/// Signs session messages on behalf of an actor.
pub trait SessionSigner: Send + Sync {
    /// The actor this signer speaks for.
    fn actor(&self) -> ActorId;

    /// The key signatures verify under.
    fn public_key(&self) -> Ed25519PublicKey;

    /// Sign the canonical bytes of a session message.
    fn sign(&self, message: &[u8]) -> Ed25519Signature;
}

impl SessionSigner for Keypair {
    fn actor(&self) -> ActorId {
        ActorId::from_public_key(&self.public_key())
    }

    fn public_key(&self) -> Ed25519PublicKey {
        Keypair::public_key(self)
    }

    fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Keypair::sign(self, message)
    }
}

impl<T: SessionSigner + ?Sized> SessionSigner for &T {
    fn actor(&self) -> ActorId {
        (**self).actor()
    }

    fn public_key(&self) -> Ed25519PublicKey {
        (**self).public_key()
    }

    fn sign(&self, message: &[u8]) -> Ed25519Signature {
        (**self).sign(message)
    }
}

/// The statement an actor signs to open a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub actor: ActorId,
    /// Network the session is valid on.
    pub network: String,
    pub resource: String,
    pub ability: String,
    /// Fresh value from the network, preventing replay across sessions.
    pub nonce: String,
    /// Unix milliseconds.
    pub issued_at: i64,
    /// Unix milliseconds.
    pub expires_at: i64,
}

impl SessionMessage {
    /// Canonical CBOR bytes, the signed form.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let text = |s: &str| Value::Text(s.to_string());
        let value = Value::Map(vec![
            (text("actor"), text(self.actor.as_str())),
            (text("network"), text(&self.network)),
            (text("resource"), text(&self.resource)),
            (text("ability"), text(&self.ability)),
            (text("nonce"), text(&self.nonce)),
            (text("issued_at"), Value::Integer(self.issued_at.into())),
            (text("expires_at"), Value::Integer(self.expires_at.into())),
        ]);
        Ok(encode_canonical(&value)?)
    }
}

/// A signed session message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProof {
    pub message: SessionMessage,
    pub public_key: Ed25519PublicKey,
    pub signature: Ed25519Signature,
}

impl SessionProof {
    /// Sign `message` with `signer`.
    pub fn issue<S: SessionSigner + ?Sized>(signer: &S, message: SessionMessage) -> Result<Self> {
        if message.actor != signer.actor() {
            return Err(AccessError::InvalidSession(format!(
                "signer speaks for {}, message names {}",
                signer.actor(),
                message.actor
            )));
        }
        let signature = signer.sign(&message.canonical_bytes()?);
        Ok(Self {
            message,
            public_key: signer.public_key(),
            signature,
        })
    }

    /// The actor this proof authenticates.
    pub fn actor(&self) -> &ActorId {
        &self.message.actor
    }

    /// Expiry in Unix milliseconds.
    pub fn expires_at(&self) -> i64 {
        self.message.expires_at
    }

    /// Whether the proof has expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.message.expires_at
    }

    /// Fail with `SessionExpired` if the proof has expired at `now`.
    pub fn check_expiry(&self, now: i64) -> Result<()> {
        if self.is_expired(now) {
            return Err(AccessError::SessionExpired {
                expires_at: self.message.expires_at,
                now,
            });
        }
        Ok(())
    }

    /// Full verification as performed by network nodes.
    pub fn verify(&self, network: &str, now: i64) -> Result<()> {
        let message = &self.message;

        if message.network != network {
            return Err(AccessError::InvalidSession(format!(
                "session is for network {:?}",
                message.network
            )));
        }
        let window = message.expires_at.saturating_sub(message.issued_at);
        if window <= 0 || window > MAX_SESSION_TTL.as_millis() as i64 {
            return Err(AccessError::InvalidSession(format!(
                "validity window of {} ms",
                window
            )));
        }
        if ActorId::from_public_key(&self.public_key) != message.actor {
            return Err(AccessError::InvalidSession(
                "actor is not bound to the signing key".into(),
            ));
        }
        self.public_key
            .verify(&message.canonical_bytes()?, &self.signature)
            .map_err(|_| AccessError::InvalidSession("bad signature".into()))?;

        self.check_expiry(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn message(signer: &Keypair, ttl_ms: i64) -> SessionMessage {
        SessionMessage {
            actor: signer.actor(),
            network: "datil-dev".into(),
            resource: "*".into(),
            ability: DECRYPTION_ABILITY.into(),
            nonce: "ab12".into(),
            issued_at: NOW,
            expires_at: NOW + ttl_ms,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = Keypair::from_seed(&[1; 32]);
        let proof = SessionProof::issue(&signer, message(&signer, 60_000)).unwrap();
        proof.verify("datil-dev", NOW + 1).unwrap();
        assert_eq!(proof.actor(), &signer.actor());
    }

    #[test]
    fn test_expired_proof() {
        let signer = Keypair::from_seed(&[1; 32]);
        let proof = SessionProof::issue(&signer, message(&signer, 60_000)).unwrap();
        assert!(matches!(
            proof.verify("datil-dev", NOW + 60_000),
            Err(AccessError::SessionExpired { .. })
        ));
    }

    #[test]
    fn test_wrong_network_rejected() {
        let signer = Keypair::from_seed(&[1; 32]);
        let proof = SessionProof::issue(&signer, message(&signer, 60_000)).unwrap();
        assert!(matches!(
            proof.verify("mainnet", NOW),
            Err(AccessError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_window_longer_than_ten_minutes_rejected() {
        let signer = Keypair::from_seed(&[1; 32]);
        let proof = SessionProof::issue(&signer, message(&signer, 11 * 60_000)).unwrap();
        assert!(matches!(
            proof.verify("datil-dev", NOW),
            Err(AccessError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_tampered_message_rejected() {
        let signer = Keypair::from_seed(&[1; 32]);
        let mut proof = SessionProof::issue(&signer, message(&signer, 60_000)).unwrap();
        proof.message.nonce = "ffff".into();
        assert!(proof.verify("datil-dev", NOW).is_err());
    }

    #[test]
    fn test_borrowed_key_cannot_claim_other_actor() {
        let signer = Keypair::from_seed(&[1; 32]);
        let other = Keypair::from_seed(&[2; 32]);
        assert!(SessionProof::issue(&signer, message(&other, 60_000)).is_err());

        // Re-signing someone else's message with our key breaks the binding.
        let mut proof = SessionProof::issue(&signer, message(&signer, 60_000)).unwrap();
        proof.message.actor = other.actor();
        proof.signature = signer.sign(&proof.message.canonical_bytes().unwrap());
        assert!(matches!(
            proof.verify("datil-dev", NOW),
            Err(AccessError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_ttl_is_capped() {
        let config = SessionConfig::default().with_ttl(Duration::from_secs(3600));
        assert_eq!(config.effective_ttl(), MAX_SESSION_TTL);
    }
}
