//! Log Entry Model
//!
//! The immutable, hash-chained record type. Entries are constructed only by
//! the ledger store's append path and never mutated afterwards; corrections
//! take the form of new compensating entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::canonical::canonical_hash;
use crate::error::LedgerError;

/// Fixed `previous_hash` of the first entry in every ledger. Publicly known
/// so third parties can verify a chain from its very start.
pub const GENESIS_HASH: &str =
    "sha256:0000000000000000000000000000000000000000000000000000000000000000";

/// A single hash-chained audit record.
///
/// `current_hash` covers every other field, including `previous_hash`, so
/// any post-persistence edit is detectable by recomputation. The sender's
/// signature covers only `message_payload_hash`; in particular
/// `sender_trust_weight` is advisory metadata that is tamper-evident but not
/// authenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub index: i64,
    pub previous_hash: String,
    pub message_id: String,
    pub sender_id: String,
    pub performative: String,
    pub audit_context: HashMap<String, Value>,
    pub message_payload_hash: String,
    pub signature_verified: bool,
    pub sender_trust_weight: f64,
    pub signature: String,
    pub current_hash: String,
}

impl LogEntry {
    /// Canonical hash over every field except `current_hash` itself.
    pub fn compute_hash(&self) -> Result<String, LedgerError> {
        let hash_input = json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "index": self.index,
            "previous_hash": self.previous_hash,
            "message_id": self.message_id,
            "sender_id": self.sender_id,
            "performative": self.performative,
            "audit_context": self.audit_context,
            "message_payload_hash": self.message_payload_hash,
            "signature_verified": self.signature_verified,
            "sender_trust_weight": self.sender_trust_weight,
            "signature": self.signature,
        });
        canonical_hash(&hash_input)
    }

    /// Recompute this entry's hash and compare it to the stored value.
    pub fn verify_hash(&self) -> bool {
        match self.compute_hash() {
            Ok(hash) => hash == self.current_hash,
            Err(_) => false,
        }
    }

    /// One-line summary for operator logs.
    pub fn summary(&self) -> String {
        format!(
            "#{} {} from {} (verified: {})",
            self.index, self.performative, self.sender_id, self.signature_verified
        )
    }
}

/// A candidate message submitted for appending. Everything here is
/// caller-supplied and untrusted: the ledger recomputes the payload hash
/// itself, stamps its own timestamp, and resolves the sender key through the
/// registry rather than accepting one from the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMessage {
    pub message_id: String,
    pub sender_id: String,
    pub performative: String,
    /// Reference into the key registry; never raw key material.
    pub sender_key_ref: String,
    pub payload: Value,
    pub audit_context: HashMap<String, Value>,
    /// Advisory reputation score, not cryptographically protected.
    pub sender_trust_weight: f64,
    /// Claimed signature over the payload hash, hex-encoded.
    pub signature: String,
}

impl CandidateMessage {
    pub fn new(
        sender_id: impl Into<String>,
        performative: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender_id.into(),
            performative: performative.into(),
            sender_key_ref: String::new(),
            payload,
            audit_context: HashMap::new(),
            sender_trust_weight: 0.0,
            signature: String::new(),
        }
    }

    pub fn with_key_ref(mut self, key_ref: impl Into<String>) -> Self {
        self.sender_key_ref = key_ref.into();
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_trust_weight(mut self, weight: f64) -> Self {
        self.sender_trust_weight = weight;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.audit_context.insert(key.into(), value);
        self
    }
}
