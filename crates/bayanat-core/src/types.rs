//! Strong type definitions for Bayanat.
//!
//! All identifiers are newtypes so that a resource id can never be passed
//! where an actor id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::{Blake3Hash, Ed25519PublicKey};
use crate::error::{CoreError, Result};

/// Maximum number of decimal digits in a 256-bit unsigned integer.
const MAX_RESOURCE_ID_DIGITS: usize = 78;

/// Maximum number of hex digits in an actor id (a 20-byte address).
const MAX_ACTOR_HEX_DIGITS: usize = 40;

/// Identifier of a ledger resource.
///
/// Held in canonical decimal form: ASCII digits only, no sign, no leading
/// zeros (except for `"0"` itself), at most 78 digits so that every value
/// fits the ledger's 256-bit integer type.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Parse a resource id, rejecting anything that is not canonical.
    pub fn parse(s: &str) -> Result<Self> {
        let well_formed = !s.is_empty()
            && s.len() <= MAX_RESOURCE_ID_DIGITS
            && s.bytes().all(|b| b.is_ascii_digit())
            && !(s.len() > 1 && s.starts_with('0'));

        if !well_formed {
            return Err(CoreError::InvalidResourceId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the canonical decimal string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric value, if it fits in a `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl From<u64> for ResourceId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl FromStr for ResourceId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an actor (a wallet-style address).
///
/// Stored lowercase with a `0x` prefix and 1 to 40 hex digits, so that
/// `0xAB` and `0xab` name the same actor.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    /// Parse and normalize an actor id.
    pub fn parse(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| CoreError::InvalidActorId(s.to_string()))?;

        if digits.is_empty()
            || digits.len() > MAX_ACTOR_HEX_DIGITS
            || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(CoreError::InvalidActorId(s.to_string()));
        }

        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// The actor id bound to an Ed25519 signing key.
    ///
    /// `0x` followed by the hex of the first 20 bytes of BLAKE3(public key).
    pub fn from_public_key(public_key: &Ed25519PublicKey) -> Self {
        let digest = Blake3Hash::hash(public_key.as_bytes());
        Self(format!("0x{}", hex::encode(&digest.as_bytes()[..20])))
    }

    /// The zero address, returned by the ledger in place of a missing owner.
    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(MAX_ACTOR_HEX_DIGITS)))
    }

    /// Get the normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ActorId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ActorId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ActorId> for String {
    fn from(id: ActorId) -> Self {
        id.0
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of the ledger contract that hosts the permission check.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerAddress(pub [u8; 20]);

impl LedgerAddress {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parse from a `0x`-prefixed, 40-digit hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(digits).map_err(|_| CoreError::InvalidLedgerAddress(s.to_string()))?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidLedgerAddress(s.to_string()))?;
        Ok(Self(arr))
    }

    /// Convert to `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerAddress({})", self.to_hex())
    }
}

impl fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Listing visibility of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Visibility {
    /// Listed on the marketplace and open for purchase.
    Public = 0,
    /// Visible only to its owner and existing grantees.
    Private = 1,
}

impl Visibility {
    /// Convert from the ledger's numeric encoding.
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            0 => Some(Visibility::Public),
            1 => Some(Visibility::Private),
            _ => None,
        }
    }

    /// Convert to the ledger's numeric encoding.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// A non-negative amount in a 6-decimal fixed-point currency unit.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(pub u64);

impl Amount {
    /// Number of base units per whole currency unit.
    pub const UNITS_PER_WHOLE: u64 = 1_000_000;

    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Create from base units.
    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Create from whole currency units, saturating on overflow.
    pub const fn from_whole(whole: u64) -> Self {
        Self(whole.saturating_mul(Self::UNITS_PER_WHOLE))
    }

    /// Base units.
    pub const fn units(&self) -> u64 {
        self.0
    }

    /// Saturating addition.
    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}",
            self.0 / Self::UNITS_PER_WHOLE,
            self.0 % Self::UNITS_PER_WHOLE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_resource_id_accepts_canonical_decimal() {
        assert_eq!(ResourceId::parse("42").unwrap().as_str(), "42");
        assert_eq!(ResourceId::parse("0").unwrap().as_u64(), Some(0));
        assert_eq!(ResourceId::from(7u64), ResourceId::parse("7").unwrap());
    }

    #[test]
    fn test_resource_id_rejects_malformed() {
        for bad in ["", "-1", "042", "4 2", "0x2a", "1.5", "abc"] {
            assert!(
                matches!(ResourceId::parse(bad), Err(CoreError::InvalidResourceId(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(ResourceId::parse(&"9".repeat(79)).is_err());
        assert!(ResourceId::parse(&"9".repeat(78)).is_ok());
    }

    #[test]
    fn test_resource_id_serde_validates() {
        let ok: ResourceId = serde_json::from_str("\"12\"").unwrap();
        assert_eq!(ok.as_str(), "12");
        assert!(serde_json::from_str::<ResourceId>("\"012\"").is_err());
    }

    #[test]
    fn test_actor_id_normalizes_case() {
        let a = ActorId::parse("0xAbC").unwrap();
        let b = ActorId::parse("0Xabc").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabc");
    }

    #[test]
    fn test_actor_id_rejects_malformed() {
        let too_long = format!("0x{}", "a".repeat(41));
        for bad in ["", "0x", "abc", "0xzz", too_long.as_str()] {
            assert!(ActorId::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_actor_id_from_public_key_is_stable() {
        let keypair = Keypair::from_seed(&[7u8; 32]);
        let a = ActorId::from_public_key(&keypair.public_key());
        let b = ActorId::from_public_key(&keypair.public_key());
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 42);
        assert_eq!(ActorId::parse(a.as_str()).unwrap(), a);
    }

    #[test]
    fn test_ledger_address_hex_roundtrip() {
        let addr = LedgerAddress::from_bytes([0x11; 20]);
        let parsed = LedgerAddress::from_hex(&addr.to_hex()).unwrap();
        assert_eq!(addr, parsed);
        assert!(LedgerAddress::from_hex("0x1234").is_err());
    }

    #[test]
    fn test_amount_display() {
        assert_eq!(Amount::from_units(1_500_000).to_string(), "1.500000");
        assert_eq!(Amount::from_whole(3).units(), 3_000_000);
        assert_eq!(Amount::ZERO.to_string(), "0.000000");
    }

    proptest::proptest! {
        #[test]
        fn resource_ids_roundtrip_through_decimal(n in proptest::prelude::any::<u64>()) {
            let id = ResourceId::from(n);
            proptest::prop_assert_eq!(ResourceId::parse(id.as_str()).unwrap(), id.clone());
            proptest::prop_assert_eq!(id.as_u64(), Some(n));
        }
    }

    #[test]
    fn test_visibility_encoding() {
        assert_eq!(Visibility::from_u8(0), Some(Visibility::Public));
        assert_eq!(Visibility::from_u8(1), Some(Visibility::Private));
        assert_eq!(Visibility::from_u8(2), None);
        assert_eq!(Visibility::Private.to_u8(), 1);
    }
}
