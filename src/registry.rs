//! Key Registry Interface
//!
//! The ledger resolves sender keys exclusively through this interface; a key
//! embedded in an incoming message is never accepted. An absent key means an
//! untrusted sender: the append still happens, with
//! `signature_verified = false`.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use crate::error::LedgerError;

/// Maps a key-reference id to trusted public key material. Implemented by the
/// external key-management collaborator; the in-memory implementation below
/// serves tests and single-node deployments provisioned from a key directory.
pub trait KeyRegistry: Send + Sync {
    /// Resolve a key reference to public key material (PEM or hex-encoded
    /// SEC1 bytes, opaque to the registry). `None` means the sender is
    /// unknown and therefore untrusted.
    fn get_public_key_pem(&self, key_ref_id: &str) -> Result<Option<Vec<u8>>, LedgerError>;
}

/// Registry backed by an in-memory map, loaded once at startup.
pub struct InMemoryKeyRegistry {
    keys: HashMap<String, Vec<u8>>,
}

impl InMemoryKeyRegistry {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key_ref_id: impl Into<String>, material: Vec<u8>) {
        self.keys.insert(key_ref_id.into(), material);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Load every file in `dir` as a key, keyed by file stem. Files the
    /// process cannot read are skipped with a warning rather than failing
    /// startup; a missing key only downgrades that sender to untrusted.
    pub fn from_key_dir(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let dir = dir.as_ref();
        let mut registry = Self::new();

        let entries = std::fs::read_dir(dir).map_err(|e| {
            LedgerError::ConfigError(format!("Failed to read key directory {:?}: {}", dir, e))
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                LedgerError::ConfigError(format!("Failed to list key directory: {}", e))
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let key_ref = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };

            match std::fs::read(&path) {
                Ok(material) => {
                    registry.insert(key_ref, material);
                }
                Err(e) => {
                    warn!("Skipping unreadable key file {:?}: {}", path, e);
                }
            }
        }

        info!("Loaded {} keys from {:?}", registry.keys.len(), dir);
        Ok(registry)
    }
}

impl Default for InMemoryKeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyRegistry for InMemoryKeyRegistry {
    fn get_public_key_pem(&self, key_ref_id: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.keys.get(key_ref_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_key_is_none() {
        let registry = InMemoryKeyRegistry::new();
        assert!(registry.get_public_key_pem("nobody").unwrap().is_none());
    }

    #[test]
    fn test_inserted_key_resolves() {
        let mut registry = InMemoryKeyRegistry::new();
        registry.insert("agent-7", b"02abcd".to_vec());

        let material = registry.get_public_key_pem("agent-7").unwrap();
        assert_eq!(material, Some(b"02abcd".to_vec()));
    }

    #[test]
    fn test_from_key_dir_keys_by_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("agent-7.pub"), "02abcd").unwrap();
        std::fs::write(dir.path().join("operator-1.pub"), "03ef01").unwrap();

        let registry = InMemoryKeyRegistry::from_key_dir(dir.path()).unwrap();
        assert!(registry.get_public_key_pem("agent-7").unwrap().is_some());
        assert!(registry.get_public_key_pem("operator-1").unwrap().is_some());
        assert!(registry.get_public_key_pem("agent-8").unwrap().is_none());
    }
}
