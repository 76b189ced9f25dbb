//! Key agreement and authenticated encryption.
//!
//! The encryption network holds a static X25519 key. Each sealing operation
//! generates an ephemeral X25519 key, derives a ChaCha20-Poly1305 key from
//! the shared secret, and binds the canonical predicate bytes as associated
//! data so that a ciphertext cannot be reopened under a different predicate.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{AccessError, Result};

/// Domain-separation context for sealing keys.
const SEAL_KEY_CONTEXT: &str = "bayanat-access-v1 seal key";

/// An X25519 public key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// The network's static X25519 secret.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(StaticSecret::from(bytes))
    }

    /// Create from seed bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Derive the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&self.0))
    }

    /// Derive the sealing key for an envelope addressed to this secret.
    pub(crate) fn sealing_key(&self, ephemeral: &X25519PublicKey, context: &[u8]) -> SealingKey {
        let shared = self.0.diffie_hellman(&ephemeral.to_dalek());
        SealingKey::derive(shared.as_bytes(), context)
    }
}

/// A one-time X25519 key used for a single sealing operation.
pub(crate) struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    pub(crate) fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = X25519PublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    pub(crate) fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Agree with the recipient and derive the sealing key. Consumes the secret.
    pub(crate) fn sealing_key(self, recipient: &X25519PublicKey, context: &[u8]) -> SealingKey {
        let shared = self.secret.diffie_hellman(&recipient.to_dalek());
        SealingKey::derive(shared.as_bytes(), context)
    }
}

/// A ChaCha20-Poly1305 key derived from a shared secret.
pub(crate) struct SealingKey([u8; 32]);

impl SealingKey {
    fn derive(shared: &[u8; 32], context: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(SEAL_KEY_CONTEXT);
        hasher.update(shared);
        hasher.update(context);
        Self(*hasher.finalize().as_bytes())
    }

    pub(crate) fn seal(&self, plaintext: &[u8], aad: &[u8], nonce: &SealNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| AccessError::Encryption(e.to_string()))?;
        cipher
            .encrypt(Nonce::from_slice(&nonce.0), Payload { msg: plaintext, aad })
            .map_err(|e| AccessError::Encryption(e.to_string()))
    }

    pub(crate) fn open(&self, ciphertext: &[u8], aad: &[u8], nonce: &SealNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| AccessError::Encryption(e.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(&nonce.0), Payload { msg: ciphertext, aad })
            .map_err(|_| AccessError::CorruptCiphertext("authentication failed".into()))
    }
}

/// A 96-bit ChaCha20-Poly1305 nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealNonce(pub [u8; 12]);

impl SealNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}
