//! Proptest generators for property-based testing.

use bioledger_core::{
    Address, CredentialId, CredentialType, MaterialId, MaterialStatus, MaterialType, Sha256Hash,
    TransferId,
};
use proptest::prelude::*;
use serde_json::Value;

/// Generate a random address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::from_bytes)
}

/// Generate a random non-zero digest.
pub fn digest() -> impl Strategy<Value = Sha256Hash> {
    any::<Vec<u8>>().prop_map(|bytes| Sha256Hash::hash(&bytes))
}

/// Generate a material type.
pub fn material_type() -> impl Strategy<Value = MaterialType> {
    prop_oneof![Just(MaterialType::CellLine), Just(MaterialType::Plasmid)]
}

/// Generate a material status.
pub fn material_status() -> impl Strategy<Value = MaterialStatus> {
    prop_oneof![
        Just(MaterialStatus::Active),
        Just(MaterialStatus::Quarantined),
        Just(MaterialStatus::Revoked),
    ]
}

/// Generate a credential type.
pub fn credential_type() -> impl Strategy<Value = CredentialType> {
    prop_oneof![
        Just(CredentialType::Identity),
        Just(CredentialType::QcMyco),
        Just(CredentialType::UsageRights),
    ]
}

/// Generate a material id.
pub fn material_id() -> impl Strategy<Value = MaterialId> {
    (material_type(), 1u64..=1_000_000).prop_map(|(kind, n)| {
        MaterialId::new(kind, n).expect("positive index")
    })
}

/// Generate a credential id.
pub fn credential_id() -> impl Strategy<Value = CredentialId> {
    (1u64..=1_000_000).prop_map(CredentialId)
}

/// Generate a transfer id.
pub fn transfer_id() -> impl Strategy<Value = TransferId> {
    (1u64..=1_000_000).prop_map(TransferId)
}

/// Generate a reasonable Unix-seconds timestamp.
pub fn timestamp() -> impl Strategy<Value = u64> {
    1_000_000_000u64..=4_000_000_000
}

/// Generate an arbitrary value inside the canonical JSON subset:
/// integer-only numbers, bounded depth and width.
pub fn canonical_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        "[a-zA-Z0-9 _\\-]{0,24}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,12}", inner, 0..8).prop_map(|m| {
                Value::Object(m.into_iter().collect())
            }),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioledger_core::{canonical_bytes, canonical_hash};

    proptest! {
        #[test]
        fn test_material_id_roundtrip(id in material_id()) {
            let parsed = MaterialId::parse(&id.to_string()).unwrap();
            prop_assert_eq!(parsed, id);
        }

        #[test]
        fn test_canonical_values_serialize(value in canonical_value()) {
            // Everything inside the subset canonicalizes
            prop_assert!(canonical_bytes(&value).is_ok());
        }

        #[test]
        fn test_canonical_hash_stable_under_reparse(value in canonical_value()) {
            let bytes = canonical_bytes(&value).unwrap();
            let reparsed: Value = serde_json::from_slice(&bytes).unwrap();
            prop_assert_eq!(
                canonical_hash(&value).unwrap(),
                canonical_hash(&reparsed).unwrap()
            );
        }

        #[test]
        fn test_digests_are_nonzero(digest in digest()) {
            prop_assert!(!digest.is_zero());
        }
    }
}
