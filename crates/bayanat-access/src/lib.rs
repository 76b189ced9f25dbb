//! # Bayanat Access
//!
//! Predicate-gated encryption of content references.
//!
//! ## Overview
//!
//! A producer seals a reference under an access predicate with the
//! [`EncryptionGateway`]. A consumer later asks the [`DecryptionGateway`]
//! to reopen it, presenting a short-lived [`SessionProof`]. The encryption
//! network re-evaluates the predicate against the ledger for the proof's
//! actor and only reopens the reference when enough nodes approve.
//!
//! ## Encryption Model
//!
//! 1. **Sealing**: X25519 between a per-reference ephemeral key and the
//!    network's static key, then ChaCha20-Poly1305 with the canonical
//!    predicate bytes as associated data
//! 2. **Commitment**: BLAKE3 of the plaintext reference, stored next to the
//!    ciphertext and checked after every decryption
//! 3. **Sessions**: Ed25519-signed messages naming the actor, network,
//!    nonce and an expiry of at most ten minutes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bayanat_access::{EncryptionGateway, EncryptionNetwork};
//! use bayanat_core::{Predicate, RetryPolicy};
//!
//! async fn seal<N: EncryptionNetwork>(network: Arc<N>, predicate: &Predicate) {
//!     let gateway = EncryptionGateway::new(network, RetryPolicy::default());
//!     let sealed = gateway.encrypt("cid:bafy123", predicate).await.unwrap();
//!     // register sealed.ciphertext and sealed.hash on the ledger
//! }
//! ```

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod network;
pub mod session;

pub use crypto::{SealNonce, X25519PublicKey, X25519StaticSecret};
pub use envelope::{SealFormat, SealedEnvelope};
pub use error::{AccessError, Result};
pub use gateway::{DecryptionGateway, EncryptionGateway, Sealed};
pub use network::{DecryptRequest, EncryptionNetwork, LocalNetwork, NetworkConfig};
pub use session::{
    SessionConfig, SessionMessage, SessionProof, SessionSigner, DECRYPTION_ABILITY,
    MAX_SESSION_TTL,
};
