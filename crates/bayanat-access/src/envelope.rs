//! Sealed reference envelope.
//!
//! The ciphertext stored on the ledger is a CBOR-encoded [`SealedEnvelope`]:
//! everything the network needs to reopen it, plus the digest of the
//! predicate it was sealed under.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use bayanat_core::Blake3Hash;

use crate::crypto::{EphemeralKeyPair, SealNonce, X25519PublicKey, X25519StaticSecret};
use crate::error::{AccessError, Result};

/// Envelope format identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SealFormat {
    /// X25519 key agreement, ChaCha20-Poly1305 with predicate-bound AAD.
    X25519ChaCha20Poly1305 = 1,
}

/// A reference sealed under an access predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    pub format: SealFormat,

    /// Sender's side of the key agreement.
    pub ephemeral_public: X25519PublicKey,

    pub nonce: SealNonce,

    /// Digest of the canonical predicate bytes used as AAD.
    pub predicate_digest: Blake3Hash,

    /// Encrypted reference, including the authentication tag.
    pub ciphertext: Bytes,
}

impl SealedEnvelope {
    /// Seal `plaintext` for the holder of `recipient`, bound to `predicate_bytes`.
    pub fn seal(
        plaintext: &[u8],
        predicate_bytes: &[u8],
        recipient: &X25519PublicKey,
    ) -> Result<Self> {
        let predicate_digest = Blake3Hash::hash(predicate_bytes);
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let key = ephemeral.sealing_key(recipient, predicate_digest.as_bytes());

        let nonce = SealNonce::generate();
        let ciphertext = key.seal(plaintext, predicate_bytes, &nonce)?;

        Ok(Self {
            format: SealFormat::X25519ChaCha20Poly1305,
            ephemeral_public,
            nonce,
            predicate_digest,
            ciphertext: Bytes::from(ciphertext),
        })
    }

    /// Reopen with the recipient's secret.
    ///
    /// Fails with `PredicateRejected` if `predicate_bytes` is not the
    /// predicate the envelope was sealed under.
    pub fn open(&self, predicate_bytes: &[u8], secret: &X25519StaticSecret) -> Result<Vec<u8>> {
        if Blake3Hash::hash(predicate_bytes) != self.predicate_digest {
            return Err(AccessError::PredicateRejected(
                "predicate does not match the sealed reference".into(),
            ));
        }

        match self.format {
            SealFormat::X25519ChaCha20Poly1305 => {
                let key =
                    secret.sealing_key(&self.ephemeral_public, self.predicate_digest.as_bytes());
                key.open(&self.ciphertext, predicate_bytes, &self.nonce)
            }
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| AccessError::Encryption(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| AccessError::CorruptCiphertext(e.to_string()))
    }
}
