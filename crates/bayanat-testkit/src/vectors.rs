//! Golden predicate vectors.
//!
//! Predicates are committed next to the ciphertext they gate and re-encoded
//! by every node of the encryption network, so the canonical encoding must
//! never drift. Each vector pins the exact bytes for one set of inputs.

use bayanat_core::{ConditionEncoder, LedgerAddress, Predicate, ACTOR_PLACEHOLDER};

/// A golden predicate vector.
#[derive(Debug, Clone)]
pub struct PredicateVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub chain: &'static str,
    pub ledger: [u8; 20],
    pub resource_id: &'static str,
    /// Expected canonical CBOR (hex).
    pub expected_hex: &'static str,
}

const SEQUENTIAL: [u8; 20] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f, 0x10, 0x11, 0x12, 0x13,
];

/// Get all golden vectors.
pub fn all_vectors() -> Vec<PredicateVector> {
    vec![
        PredicateVector {
            name: "resource 42 on the calibration testnet",
            chain: "filecoinCalibrationTestnet",
            ledger: [0x01; 20],
            resource_id: "42",
            expected_hex: concat!(
                "a7000101781a66696c65636f696e43616c6962726174696f6e546573746e6574",
                "02540101010101010101010101010101010101010101",
                "036a63616e44656372797074",
                "04826234326c3a7573657241646472657373",
                "05613d066474727565",
            ),
        },
        PredicateVector {
            name: "first resource",
            chain: "filecoinCalibrationTestnet",
            ledger: [0x0d; 20],
            resource_id: "1",
            expected_hex: concat!(
                "a7000101781a66696c65636f696e43616c6962726174696f6e546573746e6574",
                "02540d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d",
                "036a63616e44656372797074",
                "048261316c3a7573657241646472657373",
                "05613d066474727565",
            ),
        },
        PredicateVector {
            name: "resource zero",
            chain: "filecoinCalibrationTestnet",
            ledger: [0x01; 20],
            resource_id: "0",
            expected_hex: concat!(
                "a7000101781a66696c65636f696e43616c6962726174696f6e546573746e6574",
                "02540101010101010101010101010101010101010101",
                "036a63616e44656372797074",
                "048261306c3a7573657241646472657373",
                "05613d066474727565",
            ),
        },
        PredicateVector {
            name: "largest 256-bit resource id",
            chain: "localnet",
            ledger: SEQUENTIAL,
            resource_id: "115792089237316195423570985008687907853269984665640564039457584007913129639935",
            expected_hex: concat!(
                "a7000101686c6f63616c6e6574",
                "0254000102030405060708090a0b0c0d0e0f10111213",
                "036a63616e44656372797074",
                "0482784e",
                "313135373932303839323337333136313935343233353730393835303038363837",
                "393037383533323639393834363635363430353634303339343537353834303037",
                "3931333132393633393933356c3a7573657241646472657373",
                "05613d066474727565",
            ),
        },
    ]
}

/// Build the predicate a vector describes.
pub fn predicate_from_vector(vector: &PredicateVector) -> Predicate {
    ConditionEncoder::new(vector.chain)
        .build(
            vector.resource_id,
            LedgerAddress::from_bytes(vector.ledger),
            ACTOR_PLACEHOLDER,
        )
        .expect("golden vector inputs are valid")
}

/// Check every vector, returning the names of those that do not match.
pub fn verify_all_vectors() -> Vec<&'static str> {
    all_vectors()
        .iter()
        .filter(|v| {
            let bytes = predicate_from_vector(v)
                .canonical_bytes()
                .expect("golden predicates encode");
            hex::encode(bytes) != v.expected_hex
        })
        .map(|v| v.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bayanat_core::decode_predicate;

    #[test]
    fn test_all_vectors_match() {
        assert!(verify_all_vectors().is_empty(), "mismatched: {:?}", verify_all_vectors());
    }

    #[test]
    fn test_vectors_decode_to_their_predicates() {
        for vector in all_vectors() {
            let bytes = hex::decode(vector.expected_hex).unwrap();
            let decoded = decode_predicate(&bytes).unwrap();
            assert_eq!(decoded, predicate_from_vector(&vector), "{}", vector.name);
        }
    }

    #[test]
    fn test_vector_digests_are_distinct() {
        let digests: std::collections::HashSet<_> = all_vectors()
            .iter()
            .map(|v| predicate_from_vector(v).digest().unwrap())
            .collect();
        assert_eq!(digests.len(), all_vectors().len());
    }
}
