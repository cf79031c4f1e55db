//! Read/Query Surface
//!
//! Point-lookup proof material for external read-only audit APIs. Pagination
//! itself is `LedgerStore::get_log_range`; this module adds the
//! chain-context proof a third-party auditor wants alongside a single entry.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::ledger::entry::{LogEntry, GENESIS_HASH};
use crate::ledger::store::LedgerStore;

/// A single entry plus the evidence needed to check it independently: the
/// hash recomputed ledger-side at lookup time, whether it matches the stored
/// one, and whether the referenced predecessor is itself present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryProof {
    pub entry: LogEntry,
    pub recomputed_hash: String,
    pub hash_matches: bool,
    /// True when `previous_hash` is the genesis constant or resolves to a
    /// stored entry; false means the predecessor is absent from this store.
    pub previous_present: bool,
}

/// Look up an entry by `current_hash` and build its proof. `None` when no
/// such entry exists; absence is not an error.
pub async fn entry_proof(
    store: &LedgerStore,
    current_hash: &str,
) -> Result<Option<EntryProof>, LedgerError> {
    let entry = match store.get_log_by_hash(current_hash).await? {
        Some(entry) => entry,
        None => return Ok(None),
    };

    let recomputed_hash = entry.compute_hash()?;
    let hash_matches = recomputed_hash == entry.current_hash;

    let previous_present = entry.previous_hash == GENESIS_HASH
        || store.get_log_by_hash(&entry.previous_hash).await?.is_some();

    Ok(Some(EntryProof {
        entry,
        recomputed_hash,
        hash_matches,
        previous_present,
    }))
}
