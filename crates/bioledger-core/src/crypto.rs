//! Cryptographic primitives: SHA-256 commitments and ECDSA secp256k1 keys.
//!
//! Credentials are signed over their canonical JSON form. Signature
//! verification is a verifier-side check, not an admission check:
//! compromised issuer keys are handled through issuer revocation.

use std::fmt;

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::rand_core::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::canonical_bytes;
use crate::error::CoreError;

/// A 32-byte SHA-256 digest.
///
/// Serializes as lowercase hex so commitments read the same in reports,
/// history entries, and golden vectors.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// Compute the SHA-256 hash of data.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidDigest(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidDigest("expected 32 bytes".into()))?;
        Ok(Self(arr))
    }

    /// The zero digest (sentinel for "absent").
    pub const ZERO: Self = Self([0u8; 32]);

    /// Whether this is the zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Sha256Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Sha256Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha256Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 20-byte account identity, rendered `0x`-prefixed lowercase hex.
///
/// Derived from the SEC1-compressed public key: `sha256(sec1)[12..32]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Render as `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidDigest(e.to_string()))?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidDigest("expected 20 bytes".into()))?;
        Ok(Self(arr))
    }

    /// The zero address (sentinel).
    pub const ZERO: Self = Self([0u8; 20]);
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}...)", &self.to_hex()[..10])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 33-byte SEC1-compressed secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub [u8; 33]);

impl PublicKey {
    /// Get raw SEC1-compressed bytes.
    pub const fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Convert to lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidPublicKey)?;
        let arr: [u8; 33] = bytes.try_into().map_err(|_| CoreError::InvalidPublicKey)?;
        // Reject bytes that do not decode to a curve point
        VerifyingKey::from_sec1_bytes(&arr).map_err(|_| CoreError::InvalidPublicKey)?;
        Ok(Self(arr))
    }

    /// The account address for this key: `sha256(sec1)[12..32]`.
    pub fn address(&self) -> Address {
        let digest = Sha256Hash::hash(&self.0);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&digest.0[12..32]);
        Address(addr)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CoreError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = EcdsaSignature::from_slice(&signature.0)
            .map_err(|_| CoreError::InvalidSignature)?;
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", &self.to_hex()[..8])
    }
}

/// A 64-byte ECDSA secp256k1 signature (fixed r || s encoding).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sig({}...)", &self.to_hex()[..8])
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A secp256k1 keypair for signing credential payloads.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Create from a 32-byte seed.
    ///
    /// Fails if the seed is not a valid secp256k1 scalar (zero or >= n).
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CoreError> {
        let signing_key =
            SigningKey::from_bytes(seed.into()).map_err(|_| CoreError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        let point = self.signing_key.verifying_key().to_encoded_point(true);
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(point.as_bytes());
        PublicKey(bytes)
    }

    /// Get the account address.
    pub fn address(&self) -> Address {
        self.public_key().address()
    }

    /// Sign a message (RFC 6979 deterministic nonces).
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig: EcdsaSignature = self.signing_key.sign(message);
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&sig.to_bytes());
        Signature(bytes)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.address())
    }
}

/// Sign the canonical form of a credential payload.
pub fn sign_payload(keypair: &Keypair, payload: &Value) -> Result<Signature, CoreError> {
    let bytes = canonical_bytes(payload)?;
    Ok(keypair.sign(&bytes))
}

/// Verify a signature against the canonical form of a credential payload.
pub fn verify_payload(
    public_key: &PublicKey,
    payload: &Value,
    signature: &Signature,
) -> Result<(), CoreError> {
    let bytes = canonical_bytes(payload)?;
    public_key.verify(&bytes, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sign_verify() {
        let keypair = Keypair::generate();
        let message = b"hello world";
        let signature = keypair.sign(message);

        keypair.public_key().verify(message, &signature).unwrap();

        let tampered = b"hello worlD";
        assert!(keypair.public_key().verify(tampered, &signature).is_err());
    }

    #[test]
    fn test_deterministic_from_seed() {
        let seed = [0x42u8; 32];
        let kp1 = Keypair::from_seed(&seed).unwrap();
        let kp2 = Keypair::from_seed(&seed).unwrap();
        assert_eq!(kp1.public_key().0, kp2.public_key().0);
        assert_eq!(kp1.address(), kp2.address());
    }

    #[test]
    fn test_zero_seed_rejected() {
        assert!(Keypair::from_seed(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_sha256_hash() {
        let h1 = Sha256Hash::hash(b"test");
        let h2 = Sha256Hash::hash(b"test");
        assert_eq!(h1, h2);
        assert_ne!(h1, Sha256Hash::hash(b"different"));
        assert!(!h1.is_zero());
        assert!(Sha256Hash::ZERO.is_zero());
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let h = Sha256Hash::hash(b"roundtrip");
        let recovered = Sha256Hash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, recovered);
    }

    #[test]
    fn test_address_hex_roundtrip() {
        let addr = Keypair::generate().address();
        let hex = addr.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(Address::from_hex(&hex).unwrap(), addr);
        // Bare hex also accepted
        assert_eq!(Address::from_hex(&hex[2..]).unwrap(), addr);
    }

    #[test]
    fn test_hash_serde_as_hex() {
        let h = Sha256Hash::hash(b"serde");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
        let back: Sha256Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn test_payload_signature_covers_canonical_form() {
        let keypair = Keypair::from_seed(&[0x42; 32]).unwrap();
        let a = json!({"material": "bio:cell_line:1", "assay": "myco"});
        let b = json!({"assay": "myco", "material": "bio:cell_line:1"});

        // Same canonical form regardless of insertion order
        let sig = sign_payload(&keypair, &a).unwrap();
        verify_payload(&keypair.public_key(), &b, &sig).unwrap();

        let other = json!({"assay": "myco", "material": "bio:cell_line:2"});
        assert!(verify_payload(&keypair.public_key(), &other, &sig).is_err());
    }
}
