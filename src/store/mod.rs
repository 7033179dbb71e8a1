//! Balance store (C4): the single-writer hub for the three persisted tables.
//!
//! Concrete storage is a single SQLite file in WAL mode. Callers never see a
//! `Connection` or a query string — only the value-returning operations
//! below, each wrapped in the transactional semantics spec.md §4.4 demands.

mod schema;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::FaucetError;

/// A row of the `balances` table.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRow {
    pub l1_address: String,
    pub initial_amount: u64,
    pub consumed: bool,
    pub destination_id: Option<String>,
    pub relay_tx_id: Option<String>,
    pub consumed_at: Option<String>,
    pub created_at: String,
}

/// Singleton snapshot metadata row.
#[derive(Debug, Clone)]
pub struct SnapshotMeta {
    pub block_height: u64,
    pub address_count: u64,
    pub total_amount: u64,
    pub rpc_endpoint: String,
    pub upstream_endpoint: String,
    pub created_at: String,
}

/// Status of a claim log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    Pending,
    Success,
    Failed,
}

impl ClaimStatus {
    fn as_str(self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Success => "success",
            ClaimStatus::Failed => "failed",
        }
    }
}

/// Outcome of `atomic_consume`.
pub enum ConsumeOutcome {
    Success(BalanceRow),
    NotFound,
    AlreadyConsumed(BalanceRow),
    Raced,
}

/// The store: one connection, one mutex, opened once at startup.
pub struct BalanceStore {
    conn: Mutex<Connection>,
}

impl BalanceStore {
    /// Open (or create) the database file at `path` and ensure the schema
    /// exists. Safe to call against an existing, already-seeded database —
    /// only the snapshot builder refuses to run against one.
    pub fn open(path: &Path) -> Result<Self, FaucetError> {
        let conn = Connection::open(path)
            .map_err(|e| FaucetError::StoreFailure(format!("failed to open database: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        schema::ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Case-insensitive key lookup.
    pub fn find(&self, addr: &str) -> Result<Option<BalanceRow>, FaucetError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT l1_address, initial_amount, consumed, destination_id, relay_tx_id, \
                 consumed_at, created_at FROM balances WHERE l1_address = ?1",
                params![addr.to_lowercase()],
                Self::map_balance_row,
            )
            .optional()?;
        Ok(row)
    }

    fn map_balance_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BalanceRow> {
        Ok(BalanceRow {
            l1_address: row.get(0)?,
            initial_amount: row.get::<_, i64>(1)? as u64,
            consumed: row.get::<_, i64>(2)? != 0,
            destination_id: row.get(3)?,
            relay_tx_id: row.get(4)?,
            consumed_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    /// Insert a batch of `(addr, initial_amount)` rows in one transaction.
    /// Used only by the snapshot builder. Fails the whole batch if any
    /// primary-key collision occurs.
    pub fn bulk_insert_balances(
        &self,
        batch: &[(String, u64)],
    ) -> Result<(), FaucetError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO balances (l1_address, initial_amount) VALUES (?1, ?2)",
            )?;
            for (addr, amount) in batch {
                stmt.execute(params![addr.to_lowercase(), *amount as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// The critical primitive: reserve `addr` for `destination_id` exactly
    /// once. Runs as a single immediate (write-locking) transaction with a
    /// conditional `UPDATE ... WHERE consumed = 0` so two concurrent callers
    /// can never both observe success.
    pub fn atomic_consume(
        &self,
        addr: &str,
        destination_id: &str,
        tx_id_placeholder: &str,
    ) -> Result<ConsumeOutcome, FaucetError> {
        let mut conn = self.lock();
        let tx = conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(
                "SELECT l1_address, initial_amount, consumed, destination_id, relay_tx_id, \
                 consumed_at, created_at FROM balances WHERE l1_address = ?1",
                params![addr.to_lowercase()],
                Self::map_balance_row,
            )
            .optional()?;

        let Some(existing) = existing else {
            return Ok(ConsumeOutcome::NotFound);
        };

        if existing.consumed {
            return Ok(ConsumeOutcome::AlreadyConsumed(existing));
        }

        let changed = tx.execute(
            "UPDATE balances SET consumed = 1, destination_id = ?1, relay_tx_id = ?2, \
             consumed_at = datetime('now') WHERE l1_address = ?3 AND consumed = 0",
            params![destination_id, tx_id_placeholder, addr.to_lowercase()],
        )?;

        if changed == 0 {
            // Someone else's transaction committed between our read and our
            // write. Serialized by SQLite's writer lock, so this is a race
            // loss, not a logic bug.
            tx.rollback()?;
            return Ok(ConsumeOutcome::Raced);
        }

        let updated = tx
            .query_row(
                "SELECT l1_address, initial_amount, consumed, destination_id, relay_tx_id, \
                 consumed_at, created_at FROM balances WHERE l1_address = ?1",
                params![addr.to_lowercase()],
                Self::map_balance_row,
            )?;
        tx.commit()?;
        Ok(ConsumeOutcome::Success(updated))
    }

    /// Post-relay update: set the final relay tx id. Idempotent.
    pub fn finalize_relay_tx_id(
        &self,
        addr: &str,
        destination_id: &str,
        tx_id: &str,
    ) -> Result<(), FaucetError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE balances SET relay_tx_id = ?1 WHERE l1_address = ?2 AND destination_id = ?3",
            params![tx_id, addr.to_lowercase(), destination_id],
        )?;
        Ok(())
    }

    /// Insert a new claim log row with `status = pending`, returning its id.
    pub fn log_claim_request(
        &self,
        addr: &str,
        destination_id: &str,
        amount: u64,
        sig_hex: &str,
    ) -> Result<i64, FaucetError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO claim_requests (l1_address, destination_id, amount, signature, status, \
             created_at) VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))",
            params![
                addr.to_lowercase(),
                destination_id,
                amount as i64,
                sig_hex,
                ClaimStatus::Pending.as_str()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Finalize a claim log row (success or failed), exactly once.
    pub fn update_claim_request(
        &self,
        id: i64,
        status: ClaimStatus,
        error_text: Option<&str>,
        upstream_response: Option<&str>,
    ) -> Result<(), FaucetError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE claim_requests SET status = ?1, error_message = ?2, upstream_response = ?3, \
             processed_at = datetime('now') WHERE id = ?4",
            params![status.as_str(), error_text, upstream_response, id],
        )?;
        Ok(())
    }

    pub fn count_total(&self) -> Result<u64, FaucetError> {
        let conn = self.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM balances", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    pub fn count_unconsumed(&self) -> Result<u64, FaucetError> {
        let conn = self.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM balances WHERE consumed = 0",
            [],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    pub fn get_snapshot_meta(&self) -> Result<Option<SnapshotMeta>, FaucetError> {
        let conn = self.lock();
        let meta = conn
            .query_row(
                "SELECT block_height, address_count, total_amount, rpc_endpoint, \
                 upstream_endpoint, created_at FROM snapshot_meta WHERE id = 1",
                [],
                |row| {
                    Ok(SnapshotMeta {
                        block_height: row.get::<_, i64>(0)? as u64,
                        address_count: row.get::<_, i64>(1)? as u64,
                        total_amount: row.get::<_, i64>(2)? as u64,
                        rpc_endpoint: row.get(3)?,
                        upstream_endpoint: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(meta)
    }

    /// Written once by the snapshot builder. Fails if a metadata row
    /// already exists (the store does not allow re-snapshotting in place).
    pub fn set_snapshot_meta(
        &self,
        block_height: u64,
        address_count: u64,
        total_amount: u64,
        rpc_endpoint: &str,
        upstream_endpoint: &str,
    ) -> Result<(), FaucetError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO snapshot_meta (id, block_height, address_count, total_amount, \
             rpc_endpoint, upstream_endpoint, created_at) VALUES (1, ?1, ?2, ?3, ?4, ?5, \
             datetime('now'))",
            params![
                block_height as i64,
                address_count as i64,
                total_amount as i64,
                rpc_endpoint,
                upstream_endpoint
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn temp_store() -> (BalanceStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faucet.db");
        (BalanceStore::open(&path).unwrap(), dir)
    }

    #[test]
    fn find_missing_returns_none() {
        let (store, _dir) = temp_store();
        assert!(store.find("alpha1qnotfound").unwrap().is_none());
    }

    #[test]
    fn bulk_insert_and_find_is_case_insensitive() {
        let (store, _dir) = temp_store();
        store
            .bulk_insert_balances(&[("alpha1qAAAA".to_string(), 1000)])
            .unwrap();
        let row = store.find("ALPHA1QAAAA").unwrap().unwrap();
        assert_eq!(row.initial_amount, 1000);
        assert!(!row.consumed);
    }

    #[test]
    fn bulk_insert_rejects_collision() {
        let (store, _dir) = temp_store();
        store
            .bulk_insert_balances(&[("alpha1qaaaa".to_string(), 1000)])
            .unwrap();
        let err = store.bulk_insert_balances(&[("alpha1qaaaa".to_string(), 5)]);
        assert!(err.is_err());
        // The whole batch rejected: the original row is unchanged.
        assert_eq!(store.find("alpha1qaaaa").unwrap().unwrap().initial_amount, 1000);
    }

    #[test]
    fn atomic_consume_happy_path() {
        let (store, _dir) = temp_store();
        store
            .bulk_insert_balances(&[("alpha1qaaaa".to_string(), 1000)])
            .unwrap();
        match store.atomic_consume("alpha1qaaaa", "dest1", "pending").unwrap() {
            ConsumeOutcome::Success(row) => {
                assert!(row.consumed);
                assert_eq!(row.destination_id.as_deref(), Some("dest1"));
                assert_eq!(row.relay_tx_id.as_deref(), Some("pending"));
            }
            _ => panic!("expected success"),
        }
    }

    #[test]
    fn atomic_consume_twice_is_already_consumed() {
        let (store, _dir) = temp_store();
        store
            .bulk_insert_balances(&[("alpha1qaaaa".to_string(), 1000)])
            .unwrap();
        store.atomic_consume("alpha1qaaaa", "dest1", "pending").unwrap();
        match store.atomic_consume("alpha1qaaaa", "dest2", "pending").unwrap() {
            ConsumeOutcome::AlreadyConsumed(row) => {
                assert_eq!(row.destination_id.as_deref(), Some("dest1"));
            }
            _ => panic!("expected already-consumed"),
        }
    }

    #[test]
    fn atomic_consume_missing_row_not_found() {
        let (store, _dir) = temp_store();
        match store.atomic_consume("alpha1qmissing", "dest1", "pending").unwrap() {
            ConsumeOutcome::NotFound => {}
            _ => panic!("expected not-found"),
        }
    }

    #[test]
    fn at_most_once_under_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faucet.db");
        let store = Arc::new(BalanceStore::open(&path).unwrap());
        store
            .bulk_insert_balances(&[("alpha1qaaaa".to_string(), 1000)])
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                matches!(
                    store
                        .atomic_consume("alpha1qaaaa", &format!("dest{i}"), "pending")
                        .unwrap(),
                    ConsumeOutcome::Success(_)
                )
            }));
        }

        let successes: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn finalize_relay_tx_id_is_idempotent() {
        let (store, _dir) = temp_store();
        store
            .bulk_insert_balances(&[("alpha1qaaaa".to_string(), 1000)])
            .unwrap();
        store.atomic_consume("alpha1qaaaa", "dest1", "pending").unwrap();
        store
            .finalize_relay_tx_id("alpha1qaaaa", "dest1", "tx-123")
            .unwrap();
        store
            .finalize_relay_tx_id("alpha1qaaaa", "dest1", "tx-123")
            .unwrap();
        let row = store.find("alpha1qaaaa").unwrap().unwrap();
        assert_eq!(row.relay_tx_id.as_deref(), Some("tx-123"));
    }

    #[test]
    fn claim_log_round_trip() {
        let (store, _dir) = temp_store();
        let id = store
            .log_claim_request("alpha1qaaaa", "dest1", 1000, "ab".repeat(65).as_str())
            .unwrap();
        store
            .update_claim_request(id, ClaimStatus::Success, None, Some("{}"))
            .unwrap();
    }

    #[test]
    fn snapshot_meta_round_trip() {
        let (store, _dir) = temp_store();
        assert!(store.get_snapshot_meta().unwrap().is_none());
        store
            .set_snapshot_meta(100, 2, 3000, "http://rpc", "http://mint")
            .unwrap();
        let meta = store.get_snapshot_meta().unwrap().unwrap();
        assert_eq!(meta.block_height, 100);
        assert_eq!(meta.address_count, 2);
        assert_eq!(meta.total_amount, 3000);
    }

    #[test]
    fn counts_reflect_consumption() {
        let (store, _dir) = temp_store();
        store
            .bulk_insert_balances(&[
                ("alpha1qaaaa".to_string(), 1000),
                ("alpha1qbbbb".to_string(), 2000),
            ])
            .unwrap();
        assert_eq!(store.count_total().unwrap(), 2);
        assert_eq!(store.count_unconsumed().unwrap(), 2);
        store.atomic_consume("alpha1qaaaa", "dest1", "pending").unwrap();
        assert_eq!(store.count_unconsumed().unwrap(), 1);
    }
}
