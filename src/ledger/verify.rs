//! Chain Verifier
//!
//! Full-ledger integrity audit: walk the stored sequence by ascending index,
//! recompute every entry hash, and confirm every link. The walk
//! short-circuits at the first break; everything after a forged link is of
//! unknown provenance, so there is nothing to "heal" or skip past.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::LedgerError;
use crate::ledger::entry::GENESIS_HASH;
use crate::ledger::store::LedgerStore;

/// Rows fetched per batch during the walk.
const VERIFY_BATCH_SIZE: i64 = 256;

/// What kind of break was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakKind {
    /// Recomputed hash does not match the stored `current_hash`.
    HashMismatch,
    /// `previous_hash` does not match the predecessor's `current_hash`.
    LinkMismatch,
    /// Index sequence is not dense: an entry is missing or misnumbered.
    IndexGap,
}

/// The first detected break in the chain.
#[derive(Debug, Clone)]
pub struct ChainBreak {
    pub index: i64,
    pub kind: BreakKind,
    pub detail: String,
}

/// Outcome of a full integrity audit.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub is_intact: bool,
    /// Entries examined and confirmed valid before the walk stopped; equals
    /// the ledger length when the chain is intact.
    pub total_entries: u64,
    pub first_break: Option<ChainBreak>,
}

impl IntegrityReport {
    pub fn summary(&self) -> String {
        match &self.first_break {
            None => format!("Chain intact ({} entries)", self.total_entries),
            Some(b) => format!(
                "Chain BROKEN at entry {} ({:?}): {} ({} entries validated before the break)",
                b.index, b.kind, b.detail, self.total_entries
            ),
        }
    }
}

pub struct ChainVerifier {
    store: Arc<LedgerStore>,
}

impl ChainVerifier {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// Audit the chain up to the tail committed at audit start. Read-only
    /// and safe to run concurrently with appends: entries appended after the
    /// snapshot point are simply outside this audit's scope.
    pub async fn verify_chain_integrity(&self) -> Result<IntegrityReport, LedgerError> {
        let tail = match self.store.tail().await? {
            Some(tail) => tail,
            None => {
                info!("Integrity audit: ledger is empty, trivially intact");
                return Ok(IntegrityReport {
                    is_intact: true,
                    total_entries: 0,
                    first_break: None,
                });
            }
        };

        let upto = tail.index;
        let mut expected_prev = GENESIS_HASH.to_string();
        let mut expected_idx: i64 = 0;
        let mut validated: u64 = 0;

        while expected_idx <= upto {
            let batch = self
                .store
                .get_entries_ascending(expected_idx, upto, VERIFY_BATCH_SIZE)
                .await?;

            if batch.is_empty() {
                return Ok(self.broken(
                    validated,
                    ChainBreak {
                        index: expected_idx,
                        kind: BreakKind::IndexGap,
                        detail: format!("No entry stored at index {}", expected_idx),
                    },
                ));
            }

            for entry in batch {
                if entry.index != expected_idx {
                    return Ok(self.broken(
                        validated,
                        ChainBreak {
                            index: entry.index,
                            kind: BreakKind::IndexGap,
                            detail: format!(
                                "Expected index {}, found {}",
                                expected_idx, entry.index
                            ),
                        },
                    ));
                }

                if !entry.verify_hash() {
                    return Ok(self.broken(
                        validated,
                        ChainBreak {
                            index: entry.index,
                            kind: BreakKind::HashMismatch,
                            detail: format!(
                                "Stored hash {} does not match recomputed content hash",
                                entry.current_hash
                            ),
                        },
                    ));
                }

                if entry.previous_hash != expected_prev {
                    return Ok(self.broken(
                        validated,
                        ChainBreak {
                            index: entry.index,
                            kind: BreakKind::LinkMismatch,
                            detail: format!(
                                "previous_hash {} does not match predecessor hash {}",
                                entry.previous_hash, expected_prev
                            ),
                        },
                    ));
                }

                expected_prev = entry.current_hash;
                expected_idx += 1;
                validated += 1;
            }
        }

        info!("Integrity audit: chain intact, {} entries", validated);
        Ok(IntegrityReport {
            is_intact: true,
            total_entries: validated,
            first_break: None,
        })
    }

    fn broken(&self, validated: u64, first_break: ChainBreak) -> IntegrityReport {
        warn!(
            "Integrity audit failed at entry {}: {:?}: {}",
            first_break.index, first_break.kind, first_break.detail
        );
        IntegrityReport {
            is_intact: false,
            total_entries: validated,
            first_break: Some(first_break),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::StaticVerifier;
    use crate::ledger::entry::CandidateMessage;
    use serde_json::json;

    async fn store_with_entries(n: i64) -> Arc<LedgerStore> {
        let store = LedgerStore::new_in_memory(Arc::new(StaticVerifier::accepting()))
            .await
            .unwrap();
        for i in 0..n {
            let msg = CandidateMessage::new("agent-7", "TEST_ACTION", json!({"i": i}));
            store.append(&msg, Some(b"key")).await.unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_empty_ledger_is_intact() {
        let store = store_with_entries(0).await;
        let report = ChainVerifier::new(store).verify_chain_integrity().await.unwrap();

        assert!(report.is_intact);
        assert_eq!(report.total_entries, 0);
    }

    #[tokio::test]
    async fn test_valid_chain_reports_full_count() {
        let store = store_with_entries(3).await;
        let report = ChainVerifier::new(store).verify_chain_integrity().await.unwrap();

        assert!(report.is_intact);
        assert_eq!(report.total_entries, 3);
        assert!(report.first_break.is_none());
    }

    #[tokio::test]
    async fn test_link_tamper_detected_at_first_break() {
        let store = store_with_entries(3).await;

        // Flip the stored previous_hash of entry 1 in place.
        sqlx::query("UPDATE ledger_entries SET previous_hash = ?1 WHERE idx = 1")
            .bind("sha256:1111111111111111111111111111111111111111111111111111111111111111")
            .execute(store.pool())
            .await
            .unwrap();

        let report = ChainVerifier::new(store).verify_chain_integrity().await.unwrap();
        assert!(!report.is_intact);
        assert_eq!(report.total_entries, 1); // entry 0 still validates
        let first_break = report.first_break.unwrap();
        assert_eq!(first_break.index, 1);
        assert_eq!(first_break.kind, BreakKind::HashMismatch);
    }

    #[tokio::test]
    async fn test_content_tamper_detected() {
        let store = store_with_entries(4).await;

        sqlx::query("UPDATE ledger_entries SET sender_id = 'impostor' WHERE idx = 2")
            .execute(store.pool())
            .await
            .unwrap();

        let report = ChainVerifier::new(store).verify_chain_integrity().await.unwrap();
        assert!(!report.is_intact);
        assert_eq!(report.total_entries, 2);
        let first_break = report.first_break.unwrap();
        assert_eq!(first_break.index, 2);
        assert_eq!(first_break.kind, BreakKind::HashMismatch);
    }

    #[tokio::test]
    async fn test_missing_entry_is_index_gap() {
        let store = store_with_entries(3).await;

        sqlx::query("DELETE FROM ledger_entries WHERE idx = 1")
            .execute(store.pool())
            .await
            .unwrap();

        let report = ChainVerifier::new(store).verify_chain_integrity().await.unwrap();
        assert!(!report.is_intact);
        let first_break = report.first_break.unwrap();
        assert_eq!(first_break.kind, BreakKind::IndexGap);
    }
}
