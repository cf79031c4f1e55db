//! Signature Verification
//!
//! Validates ECDSA signatures over canonical payload hashes against public
//! keys resolved from the key registry. Malformed signatures are a
//! verification failure, never an error; key material that cannot be parsed
//! at all is a `KeyFormatError`.

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::canonical::digest_bytes;
use crate::error::LedgerError;

/// Capability interface for signature verification. The ledger store holds
/// one of these; tests inject a deterministic fake.
pub trait SignatureVerifier: Send + Sync {
    /// Check that `signature` was produced by the private half of
    /// `public_key` over exactly `payload_hash` (a `sha256:<hex>` string).
    ///
    /// Must be side-effect-free and must never log key material.
    fn verify(
        &self,
        public_key: &[u8],
        signature: &[u8],
        payload_hash: &str,
    ) -> Result<bool, LedgerError>;
}

/// Production verifier: ECDSA over secp256k1.
pub struct EcdsaVerifier {
    secp: Secp256k1<secp256k1::All>,
}

impl EcdsaVerifier {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Parse registry key material into a secp256k1 public key.
    ///
    /// Accepts raw SEC1 bytes (33-byte compressed or 65-byte uncompressed)
    /// or the same encoded as an ASCII hex string, which is how the keygen
    /// tool and the file-backed registry store keys.
    fn parse_public_key(&self, material: &[u8]) -> Result<PublicKey, LedgerError> {
        if let Ok(key) = PublicKey::from_slice(material) {
            return Ok(key);
        }

        let text = std::str::from_utf8(material)
            .map_err(|_| LedgerError::key_format("Key material is neither SEC1 bytes nor UTF-8"))?;
        let bytes = hex::decode(text.trim())
            .map_err(|e| LedgerError::key_format(format!("Invalid public key hex: {}", e)))?;

        PublicKey::from_slice(&bytes)
            .map_err(|e| LedgerError::key_format(format!("Invalid public key format: {}", e)))
    }

    /// Parse a submitted signature, trying compact form first, then DER.
    /// Returns `None` for malformed input: a signature the sender mangled is
    /// a verification failure, not our error.
    fn parse_signature(&self, signature: &[u8]) -> Option<Signature> {
        if let Ok(sig) = Signature::from_compact(signature) {
            return Some(sig);
        }
        if let Ok(sig) = Signature::from_der(signature) {
            return Some(sig);
        }

        // Hex-encoded variants of either form.
        let text = std::str::from_utf8(signature).ok()?;
        let bytes = hex::decode(text.trim()).ok()?;
        Signature::from_compact(&bytes)
            .or_else(|_| Signature::from_der(&bytes))
            .ok()
    }
}

impl SignatureVerifier for EcdsaVerifier {
    fn verify(
        &self,
        public_key: &[u8],
        signature: &[u8],
        payload_hash: &str,
    ) -> Result<bool, LedgerError> {
        let public_key = self.parse_public_key(public_key)?;

        let digest = match digest_bytes(payload_hash) {
            Ok(d) => d,
            Err(_) => return Ok(false),
        };
        let message = match Message::from_digest_slice(&digest) {
            Ok(m) => m,
            Err(_) => return Ok(false),
        };

        let signature = match self.parse_signature(signature) {
            Some(s) => s,
            None => return Ok(false),
        };

        Ok(self.secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
    }
}

impl Default for EcdsaVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EcdsaVerifier {
    /// Sign a payload hash with a secret key, producing a compact signature
    /// rendered as hex. Used by the keygen tooling and by tests; the ledger
    /// itself never signs.
    pub fn sign_payload_hash(
        &self,
        payload_hash: &str,
        secret_key: &SecretKey,
    ) -> Result<String, LedgerError> {
        let digest = digest_bytes(payload_hash)?;
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| LedgerError::encoding(format!("Invalid payload hash: {}", e)))?;
        let signature = self.secp.sign_ecdsa(&message, secret_key);
        Ok(hex::encode(signature.serialize_compact()))
    }

    /// Generate a fresh keypair, returned as (secret hex, public hex).
    pub fn generate_keypair(&self) -> (String, String) {
        use secp256k1::rand::rngs::OsRng;
        let mut rng = OsRng;
        let secret_key = SecretKey::new(&mut rng);
        let public_key = PublicKey::from_secret_key(&self.secp, &secret_key);
        (
            hex::encode(secret_key.secret_bytes()),
            hex::encode(public_key.serialize()),
        )
    }

    /// Deterministic keypair derived from a seed label. Test-support only:
    /// lets fixtures share keys without shipping key files.
    pub fn keypair_from_seed(&self, seed: &str) -> (SecretKey, String) {
        let digest = Sha256::digest(seed.as_bytes());
        let secret_key = SecretKey::from_slice(&digest)
            .unwrap_or_else(|_| SecretKey::from_slice(&[1u8; 32]).unwrap());
        let public_key = PublicKey::from_secret_key(&self.secp, &secret_key);
        (secret_key, hex::encode(public_key.serialize()))
    }
}

/// Deterministic verifier double: reports whatever it was built with.
pub struct StaticVerifier {
    outcome: bool,
}

impl StaticVerifier {
    pub fn accepting() -> Self {
        Self { outcome: true }
    }

    pub fn rejecting() -> Self {
        Self { outcome: false }
    }
}

impl SignatureVerifier for StaticVerifier {
    fn verify(&self, _: &[u8], _: &[u8], _: &str) -> Result<bool, LedgerError> {
        Ok(self.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonical_hash;
    use serde_json::json;

    #[test]
    fn test_valid_signature_verifies() {
        let verifier = EcdsaVerifier::new();
        let (secret, public_hex) = verifier.keypair_from_seed("sender-a");

        let hash = canonical_hash(&json!({"action": "SET_STATUS"})).unwrap();
        let signature = verifier.sign_payload_hash(&hash, &secret).unwrap();

        let ok = verifier
            .verify(public_hex.as_bytes(), signature.as_bytes(), &hash)
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let verifier = EcdsaVerifier::new();
        let (secret, _) = verifier.keypair_from_seed("sender-a");
        let (_, other_public) = verifier.keypair_from_seed("sender-b");

        let hash = canonical_hash(&json!({"action": "SET_STATUS"})).unwrap();
        let signature = verifier.sign_payload_hash(&hash, &secret).unwrap();

        let ok = verifier
            .verify(other_public.as_bytes(), signature.as_bytes(), &hash)
            .unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_tampered_hash_fails_verification() {
        let verifier = EcdsaVerifier::new();
        let (secret, public_hex) = verifier.keypair_from_seed("sender-a");

        let hash = canonical_hash(&json!({"value": 1})).unwrap();
        let other_hash = canonical_hash(&json!({"value": 2})).unwrap();
        let signature = verifier.sign_payload_hash(&hash, &secret).unwrap();

        let ok = verifier
            .verify(public_hex.as_bytes(), signature.as_bytes(), &other_hash)
            .unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_malformed_signature_is_failure_not_error() {
        let verifier = EcdsaVerifier::new();
        let (_, public_hex) = verifier.keypair_from_seed("sender-a");

        let hash = canonical_hash(&json!({"value": 1})).unwrap();
        let ok = verifier
            .verify(public_hex.as_bytes(), b"not-a-signature", &hash)
            .unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_unparseable_key_is_key_format_error() {
        let verifier = EcdsaVerifier::new();
        let hash = canonical_hash(&json!({"value": 1})).unwrap();

        let result = verifier.verify(b"zz-not-a-key", b"sig", &hash);
        assert!(matches!(result, Err(LedgerError::KeyFormatError(_))));
    }
}
