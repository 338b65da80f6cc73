//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::Value;

use sigchain_core::{Ed25519PublicKey, Keypair};

/// Generate a deterministic keypair from an arbitrary seed.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a public key.
pub fn public_key() -> impl Strategy<Value = Ed25519PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a subject id.
pub fn subject_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,30}"
}

/// Generate a reasonable timestamp (unix seconds, 2020 to 2040).
pub fn timestamp() -> impl Strategy<Value = i64> {
    1_577_836_800i64..2_208_988_800i64
}

/// Generate a JSON scalar.
fn json_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,40}".prop_map(Value::from),
    ]
}

/// Generate an arbitrary JSON payload, up to a few levels deep.
pub fn payload() -> impl Strategy<Value = Value> {
    json_scalar().prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z0-9_]{1,12}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate payload chunks for Merkle trees.
pub fn chunks() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..12)
}
