//! Proptest generators for property-based testing.

use proptest::prelude::*;

use bayanat_content::{ContentRef, GeneratedRow, GENERATED_OUTPUT_FEATURE};
use bayanat_core::{ActorId, Keypair, LedgerAddress, ResourceId};

/// Generate a deterministic keypair from a random seed.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a canonical resource id.
pub fn resource_id() -> impl Strategy<Value = ResourceId> {
    any::<u64>().prop_map(ResourceId::from)
}

/// Generate strings that are not canonical resource ids.
pub fn malformed_resource_id() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "0[0-9]{1,10}",
        "-[1-9][0-9]{0,5}",
        "[1-9][0-9]{0,5}[a-z ]",
        "0x[0-9a-f]{1,8}",
        "[0-9]{79,90}",
    ]
}

/// Generate an actor id.
pub fn actor_id() -> impl Strategy<Value = ActorId> {
    "0x[0-9a-f]{40}".prop_map(|s| ActorId::parse(&s).expect("pattern is a valid actor id"))
}

/// Generate a ledger address.
pub fn ledger_address() -> impl Strategy<Value = LedgerAddress> {
    any::<[u8; 20]>().prop_map(LedgerAddress::from_bytes)
}

/// Generate an opaque content reference like an IPFS CID.
pub fn opaque_reference() -> impl Strategy<Value = ContentRef> {
    "cid:baf[a-z2-7]{10,56}".prop_map(|s| ContentRef::parse(&s).expect("pattern is a valid reference"))
}

/// Generate an input column name, possibly empty.
pub fn input_feature() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-z][a-z_]{0,15}"]
        .prop_filter("must not collide with the output column", |s| {
            s != GENERATED_OUTPUT_FEATURE
        })
}

/// Generate one row as returned by the inference service.
pub fn generated_row() -> impl Strategy<Value = GeneratedRow> {
    (
        ".{0,64}",
        ".{0,128}",
        "0x[0-9a-f]{16}",
        "0x[0-9a-f]{16}",
        0u64..10_000,
    )
        .prop_map(|(input, output, signature, response_hash, total_tokens)| GeneratedRow {
            input,
            output,
            signature,
            response_hash,
            total_tokens,
        })
}

/// Generate up to `max` rows.
pub fn generated_rows(max: usize) -> impl Strategy<Value = Vec<GeneratedRow>> {
    prop::collection::vec(generated_row(), 0..=max)
}
