//! Schema definition for the three store tables (spec.md §6).

use rusqlite::Connection;

use crate::errors::FaucetError;

pub fn ensure_schema(conn: &Connection) -> Result<(), FaucetError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS balances (
            l1_address      TEXT PRIMARY KEY,
            initial_amount  INTEGER NOT NULL,
            consumed        INTEGER NOT NULL DEFAULT 0,
            destination_id  TEXT,
            relay_tx_id     TEXT,
            consumed_at     TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_balances_consumed ON balances(consumed);

        CREATE TABLE IF NOT EXISTS snapshot_meta (
            id                  INTEGER PRIMARY KEY CHECK (id = 1),
            block_height        INTEGER NOT NULL,
            address_count       INTEGER NOT NULL,
            total_amount        INTEGER NOT NULL,
            rpc_endpoint        TEXT NOT NULL,
            upstream_endpoint   TEXT NOT NULL,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS claim_requests (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            l1_address          TEXT NOT NULL,
            destination_id      TEXT NOT NULL,
            amount              INTEGER NOT NULL,
            signature           TEXT NOT NULL,
            status              TEXT NOT NULL,
            error_message       TEXT,
            upstream_response   TEXT,
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            processed_at        TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_claim_requests_address ON claim_requests(l1_address);
        CREATE INDEX IF NOT EXISTS idx_claim_requests_status ON claim_requests(status);
        ",
    )?;
    Ok(())
}
