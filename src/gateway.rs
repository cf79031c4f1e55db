//! Gateway Log Agent
//!
//! Top-level submission path tying the key registry to the ledger store: a
//! producer hands over a candidate message, the sender key is resolved
//! through the registry (never taken from the message), and the store
//! appends the entry. Verified or not, every attempt is recorded.

use std::sync::Arc;

use crate::error::LedgerError;
use crate::ledger::entry::{CandidateMessage, LogEntry};
use crate::ledger::store::LedgerStore;
use crate::registry::KeyRegistry;

pub struct LogGateway {
    store: Arc<LedgerStore>,
    registry: Arc<dyn KeyRegistry>,
}

impl LogGateway {
    pub fn new(store: Arc<LedgerStore>, registry: Arc<dyn KeyRegistry>) -> Self {
        Self { store, registry }
    }

    /// Submit a candidate message for appending. An unknown key reference
    /// downgrades the sender to untrusted; the append still happens.
    pub async fn submit(&self, msg: &CandidateMessage) -> Result<LogEntry, LedgerError> {
        let key = self.registry.get_public_key_pem(&msg.sender_key_ref)?;
        self.store.append(msg, key.as_deref()).await
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }
}
