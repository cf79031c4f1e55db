//! Ledger Store
//!
//! Durable, strictly ordered, append-only persistence of log entries. The
//! store owns the append critical section: read the current tail, build the
//! next entry, persist, serialized so no two appends can observe the same
//! tail. Reads run concurrently off the connection pool.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::canonical::canonical_hash;
use crate::crypto::SignatureVerifier;
use crate::error::LedgerError;
use crate::ledger::entry::{CandidateMessage, LogEntry, GENESIS_HASH};

/// Default cap on `get_log_range` page sizes.
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 500;

pub struct LedgerStore {
    pool: SqlitePool,
    verifier: Arc<dyn SignatureVerifier>,
    append_lock: Mutex<()>,
    max_page_size: i64,
}

impl LedgerStore {
    pub async fn new(
        database_url: &str,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Result<Self, LedgerError> {
        let pool = SqlitePool::connect(database_url).await?;
        Ok(Self {
            pool,
            verifier,
            append_lock: Mutex::new(()),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        })
    }

    /// In-memory store for tests. A single connection keeps every handle on
    /// the same SQLite memory database.
    pub async fn new_in_memory(verifier: Arc<dyn SignatureVerifier>) -> Result<Self, LedgerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self {
            pool,
            verifier,
            append_lock: Mutex::new(()),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn with_max_page_size(mut self, max_page_size: i64) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::raw_sql(include_str!("../../migrations/001_ledger_schema.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append a candidate message as a new chained entry.
    ///
    /// The payload hash is recomputed here; a caller-claimed hash is never
    /// trusted. Signature or key failures are recorded in the entry
    /// (`signature_verified = false`), never raised; only canonical-encoding
    /// failures (before persistence) and genuine I/O failures are errors.
    pub async fn append(
        &self,
        msg: &CandidateMessage,
        resolved_key: Option<&[u8]>,
    ) -> Result<LogEntry, LedgerError> {
        if !msg.sender_trust_weight.is_finite() {
            return Err(LedgerError::encoding(
                "sender_trust_weight must be a finite number",
            ));
        }

        // Refused with EncodingError before anything is persisted.
        let message_payload_hash = canonical_hash(&msg.payload)?;

        let signature_verified = match resolved_key {
            None => false,
            Some(key) => {
                match self
                    .verifier
                    .verify(key, msg.signature.as_bytes(), &message_payload_hash)
                {
                    Ok(outcome) => outcome,
                    Err(LedgerError::KeyFormatError(e)) => {
                        // Unparseable key material downgrades to "no key";
                        // the attempt is still recorded.
                        warn!("Key material for {} unparseable: {}", msg.sender_key_ref, e);
                        false
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        // Critical section: no two appends may observe the same tail.
        let _guard = self.append_lock.lock().await;

        let tail = self.tail().await?;
        let (index, previous_hash) = match &tail {
            Some(t) => (t.index + 1, t.current_hash.clone()),
            None => (0, GENESIS_HASH.to_string()),
        };

        let mut entry = LogEntry {
            timestamp: Utc::now(),
            index,
            previous_hash,
            message_id: msg.message_id.clone(),
            sender_id: msg.sender_id.clone(),
            performative: msg.performative.clone(),
            audit_context: msg.audit_context.clone(),
            message_payload_hash,
            signature_verified,
            sender_trust_weight: msg.sender_trust_weight,
            signature: msg.signature.clone(),
            current_hash: String::new(),
        };
        entry.current_hash = entry.compute_hash()?;

        let audit_context_json = serde_json::to_string(&entry.audit_context)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                idx, timestamp, previous_hash, message_id, sender_id,
                performative, audit_context, message_payload_hash,
                signature_verified, sender_trust_weight, signature, current_hash
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(entry.index)
        .bind(entry.timestamp.to_rfc3339())
        .bind(&entry.previous_hash)
        .bind(&entry.message_id)
        .bind(&entry.sender_id)
        .bind(&entry.performative)
        .bind(&audit_context_json)
        .bind(&entry.message_payload_hash)
        .bind(entry.signature_verified)
        .bind(entry.sender_trust_weight)
        .bind(&entry.signature)
        .bind(&entry.current_hash)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!("Appended ledger entry: {}", entry.summary());
        Ok(entry)
    }

    /// Page through the ledger newest first. `limit` is capped at the
    /// configured maximum; an offset past the end yields an empty page.
    pub async fn get_log_range(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LogEntry>, LedgerError> {
        let limit = limit.clamp(0, self.max_page_size);
        let offset = offset.max(0);

        let rows = sqlx::query(
            r#"
            SELECT idx, timestamp, previous_hash, message_id, sender_id,
                   performative, audit_context, message_payload_hash,
                   signature_verified, sender_trust_weight, signature, current_hash
            FROM ledger_entries
            ORDER BY idx DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Point lookup by `current_hash` over the secondary index.
    pub async fn get_log_by_hash(
        &self,
        current_hash: &str,
    ) -> Result<Option<LogEntry>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT idx, timestamp, previous_hash, message_id, sender_id,
                   performative, audit_context, message_payload_hash,
                   signature_verified, sender_trust_weight, signature, current_hash
            FROM ledger_entries
            WHERE current_hash = ?1
            "#,
        )
        .bind(current_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    /// The most recently appended entry, if any.
    pub async fn tail(&self) -> Result<Option<LogEntry>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT idx, timestamp, previous_hash, message_id, sender_id,
                   performative, audit_context, message_payload_hash,
                   signature_verified, sender_trust_weight, signature, current_hash
            FROM ledger_entries
            ORDER BY idx DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    pub async fn len(&self) -> Result<u64, LedgerError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM ledger_entries")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    pub async fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len().await? == 0)
    }

    /// Ascending batch read used by the chain verifier: entries with
    /// `from_idx <= idx <= upto_idx`, oldest first, at most `batch` rows.
    pub async fn get_entries_ascending(
        &self,
        from_idx: i64,
        upto_idx: i64,
        batch: i64,
    ) -> Result<Vec<LogEntry>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT idx, timestamp, previous_hash, message_id, sender_id,
                   performative, audit_context, message_payload_hash,
                   signature_verified, sender_trust_weight, signature, current_hash
            FROM ledger_entries
            WHERE idx >= ?1 AND idx <= ?2
            ORDER BY idx ASC
            LIMIT ?3
            "#,
        )
        .bind(from_idx)
        .bind(upto_idx)
        .bind(batch)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<LogEntry, LedgerError> {
    let timestamp_text: String = row.try_get("timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_text)
        .map_err(|e| LedgerError::storage(format!("Corrupt timestamp in stored entry: {}", e)))?
        .with_timezone(&Utc);

    let audit_context_json: String = row.try_get("audit_context")?;
    let audit_context: HashMap<String, serde_json::Value> =
        serde_json::from_str(&audit_context_json)
            .map_err(|e| LedgerError::storage(format!("Corrupt audit context: {}", e)))?;

    Ok(LogEntry {
        timestamp,
        index: row.try_get("idx")?,
        previous_hash: row.try_get("previous_hash")?,
        message_id: row.try_get("message_id")?,
        sender_id: row.try_get("sender_id")?,
        performative: row.try_get("performative")?,
        audit_context,
        message_payload_hash: row.try_get("message_payload_hash")?,
        signature_verified: row.try_get("signature_verified")?,
        sender_trust_weight: row.try_get("sender_trust_weight")?,
        signature: row.try_get("signature")?,
        current_hash: row.try_get("current_hash")?,
    })
}
