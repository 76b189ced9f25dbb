//! Content references.

use std::fmt;

use serde::{Deserialize, Serialize};

use bayanat_core::Blake3Hash;

use crate::error::{ContentError, Result};

/// Prefix of references minted by [`ContentRef::for_bytes`].
const BLAKE3_PREFIX: &str = "cid:b3";

const MAX_REFERENCE_LEN: usize = 256;

/// A content-addressed locator.
///
/// References produced here are `cid:b3<hex blake3>`; references from
/// other stores (IPFS CIDs and the like) are accepted as opaque strings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentRef(String);

impl ContentRef {
    /// Parse a reference: non-empty, printable ASCII, no whitespace.
    pub fn parse(s: &str) -> Result<Self> {
        let valid = !s.is_empty()
            && s.len() <= MAX_REFERENCE_LEN
            && s.bytes().all(|b| b.is_ascii_graphic());
        if !valid {
            return Err(ContentError::InvalidReference(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// The reference addressing `bytes`.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        Self(format!("{}{}", BLAKE3_PREFIX, Blake3Hash::hash(bytes).to_hex()))
    }

    /// The digest embedded in a BLAKE3 reference, if this is one.
    pub fn digest(&self) -> Option<Blake3Hash> {
        self.0
            .strip_prefix(BLAKE3_PREFIX)
            .and_then(|hex| Blake3Hash::from_hex(hex).ok())
    }

    /// Whether `bytes` are the content this reference addresses.
    ///
    /// Opaque references cannot be checked and always match.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.digest()
            .map_or(true, |digest| digest == Blake3Hash::hash(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentRef {
    type Error = ContentError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ContentRef> for String {
    fn from(r: ContentRef) -> Self {
        r.0
    }
}

impl fmt::Debug for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentRef({})", self.0)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
