//! Periodic Integrity Job
//!
//! Runs the chain verifier, escalates a broken chain through the alerting
//! interface, and emits a heartbeat on success. The daemon loops this on an
//! interval; the integrity-check CLI runs it once and maps the result to an
//! exit status.

use std::sync::Arc;
use tracing::info;

use crate::alert::AlertNotifier;
use crate::error::LedgerError;
use crate::ledger::verify::{ChainVerifier, IntegrityReport};

pub struct IntegrityJob {
    verifier: ChainVerifier,
    notifier: Arc<dyn AlertNotifier>,
    alert_recipient: String,
}

impl IntegrityJob {
    pub fn new(
        verifier: ChainVerifier,
        notifier: Arc<dyn AlertNotifier>,
        alert_recipient: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            notifier,
            alert_recipient: alert_recipient.into(),
        }
    }

    /// One audit pass. A broken chain triggers the notifier; the report is
    /// returned either way so schedulers can map it to an exit status.
    /// Errors here are storage failures, not chain breaks.
    pub async fn run_once(&self) -> Result<IntegrityReport, LedgerError> {
        let report = self.verifier.verify_chain_integrity().await?;

        if report.is_intact {
            info!(
                "Ledger integrity heartbeat: {} entries intact",
                report.total_entries
            );
        } else {
            self.notifier.notify(
                &self.alert_recipient,
                "Ledger chain integrity failure",
                &report.summary(),
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::RecordingNotifier;
    use crate::crypto::StaticVerifier;
    use crate::ledger::entry::CandidateMessage;
    use crate::ledger::store::LedgerStore;
    use serde_json::json;

    async fn seeded_store(n: i64) -> Arc<LedgerStore> {
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
    async fn test_intact_chain_sends_no_alert() {
        let store = seeded_store(3).await;
        let notifier = Arc::new(RecordingNotifier::new());
        let job = IntegrityJob::new(
            ChainVerifier::new(store),
            notifier.clone(),
            "ledger-operators",
        );

        let report = job.run_once().await.unwrap();
        assert!(report.is_intact);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_broken_chain_triggers_alert() {
        let store = seeded_store(3).await;
        sqlx::query("UPDATE ledger_entries SET sender_id = 'impostor' WHERE idx = 1")
            .execute(store.pool())
            .await
            .unwrap();

        let notifier = Arc::new(RecordingNotifier::new());
        let job = IntegrityJob::new(
            ChainVerifier::new(store),
            notifier.clone(),
            "ledger-operators",
        );

        let report = job.run_once().await.unwrap();
        assert!(!report.is_intact);
        assert_eq!(notifier.count(), 1);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].0, "ledger-operators");
        assert!(sent[0].2.contains("BROKEN"));
    }
}
