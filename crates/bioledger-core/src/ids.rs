//! Typed identifiers and the monotonic minter.
//!
//! All identifiers are newtypes to prevent misuse at compile time.
//! Wire forms: `bio:cell_line:<n>`, `bio:plasmid:<n>`, `cred:<n>`,
//! `xfer:<n>` with `n` a positive decimal integer. IDs are never reused.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::types::MaterialType;

/// Identifier of a tracked material, qualified by its kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId {
    pub kind: MaterialType,
    pub n: u64,
}

impl MaterialId {
    /// Create from parts. `n` must be positive.
    pub fn new(kind: MaterialType, n: u64) -> Result<Self, CoreError> {
        if n == 0 {
            return Err(CoreError::InvalidIdentifier("material index must be positive".into()));
        }
        Ok(Self { kind, n })
    }

    /// Parse from the `bio:<kind>:<n>` wire form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let rest = s
            .strip_prefix("bio:")
            .ok_or_else(|| CoreError::InvalidIdentifier(s.into()))?;
        let (kind_str, n_str) = rest
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidIdentifier(s.into()))?;
        let kind = match kind_str {
            "cell_line" => MaterialType::CellLine,
            "plasmid" => MaterialType::Plasmid,
            _ => return Err(CoreError::InvalidIdentifier(s.into())),
        };
        let n = parse_index(n_str).ok_or_else(|| CoreError::InvalidIdentifier(s.into()))?;
        Self::new(kind, n)
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bio:{}:{}", self.kind.id_segment(), self.n)
    }
}

impl fmt::Debug for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaterialId({self})")
    }
}

/// Identifier of a credential: `cred:<n>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialId(pub u64);

impl CredentialId {
    /// Parse from the `cred:<n>` wire form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let n_str = s
            .strip_prefix("cred:")
            .ok_or_else(|| CoreError::InvalidIdentifier(s.into()))?;
        parse_index(n_str)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidIdentifier(s.into()))
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cred:{}", self.0)
    }
}

impl fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialId({self})")
    }
}

/// Identifier of a transfer: `xfer:<n>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(pub u64);

impl TransferId {
    /// Parse from the `xfer:<n>` wire form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let n_str = s
            .strip_prefix("xfer:")
            .ok_or_else(|| CoreError::InvalidIdentifier(s.into()))?;
        parse_index(n_str)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidIdentifier(s.into()))
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xfer:{}", self.0)
    }
}

impl fmt::Debug for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransferId({self})")
    }
}

/// Positive decimal integer with no leading zeros.
fn parse_index(s: &str) -> Option<u64> {
    if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    match s.parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(MaterialId);
string_serde!(CredentialId);
string_serde!(TransferId);

/// Process-local monotonic counters for the three identifier spaces.
///
/// Owned by the registry writer; never shared across writers, so no
/// synchronization is needed here.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct IdMinter {
    materials: u64,
    credentials: u64,
    transfers: u64,
}

impl IdMinter {
    /// Create a minter with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next material id for the given kind.
    pub fn next_material(&mut self, kind: MaterialType) -> MaterialId {
        self.materials += 1;
        MaterialId { kind, n: self.materials }
    }

    /// Mint the next credential id.
    pub fn next_credential(&mut self) -> CredentialId {
        self.credentials += 1;
        CredentialId(self.credentials)
    }

    /// Mint the next transfer id.
    pub fn next_transfer(&mut self) -> TransferId {
        self.transfers += 1;
        TransferId(self.transfers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_id_roundtrip() {
        let id = MaterialId::new(MaterialType::CellLine, 7).unwrap();
        assert_eq!(id.to_string(), "bio:cell_line:7");
        assert_eq!(MaterialId::parse("bio:cell_line:7").unwrap(), id);

        let id = MaterialId::new(MaterialType::Plasmid, 123).unwrap();
        assert_eq!(id.to_string(), "bio:plasmid:123");
        assert_eq!(MaterialId::parse("bio:plasmid:123").unwrap(), id);
    }

    #[test]
    fn test_material_id_rejects_malformed() {
        for bad in [
            "bio:cell_line:0",
            "bio:cell_line:01",
            "bio:organoid:1",
            "bio:cell_line:",
            "cell_line:1",
            "bio:cell_line:1:2",
            "bio:cell_line:-1",
        ] {
            assert!(MaterialId::parse(bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn test_credential_and_transfer_ids() {
        assert_eq!(CredentialId::parse("cred:42").unwrap(), CredentialId(42));
        assert_eq!(CredentialId(42).to_string(), "cred:42");
        assert!(CredentialId::parse("cred:0").is_err());

        assert_eq!(TransferId::parse("xfer:9").unwrap(), TransferId(9));
        assert_eq!(TransferId(9).to_string(), "xfer:9");
        assert!(TransferId::parse("xfer:x").is_err());
    }

    #[test]
    fn test_minter_monotone_per_space() {
        let mut minter = IdMinter::new();
        let m1 = minter.next_material(MaterialType::CellLine);
        let m2 = minter.next_material(MaterialType::Plasmid);
        let c1 = minter.next_credential();
        let t1 = minter.next_transfer();
        let c2 = minter.next_credential();

        assert_eq!(m1.n, 1);
        assert_eq!(m2.n, 2);
        assert_eq!(c1, CredentialId(1));
        assert_eq!(c2, CredentialId(2));
        assert_eq!(t1, TransferId(1));
    }

    #[test]
    fn test_id_serde_as_string() {
        let id = MaterialId::new(MaterialType::Plasmid, 3).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"bio:plasmid:3\"");
        let back: MaterialId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
