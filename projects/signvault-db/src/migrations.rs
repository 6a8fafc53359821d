use crate::errors::Result;
use rusqlite::Connection;

/// Initialize the database schema
pub fn apply_migrations(conn: &Connection) -> Result<()> {
    // Enable WAL mode and foreign keys
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    log::info!("Creating database schema...");

    conn.execute_batch(FULL_SCHEMA)?;

    log::info!("Database schema created successfully");
    Ok(())
}

// Complete database schema - all tables and indexes
const FULL_SCHEMA: &str = r#"
-- SignVault Database Schema v1
PRAGMA journal_mode=WAL;
PRAGMA foreign_keys = ON;

-- Hardware wallet associations: one row per (user, device, chain, path)
CREATE TABLE IF NOT EXISTS wallet_associations (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          TEXT NOT NULL,
    device_type      TEXT NOT NULL,      -- 'ledger_nano_s' | 'ledger_nano_x' | 'trezor_one' | 'trezor_model_t' | 'mock'
    device_id        TEXT NOT NULL,
    device_label     TEXT,
    firmware_version TEXT,
    public_key       TEXT NOT NULL,
    address          TEXT NOT NULL,
    chain            TEXT NOT NULL,      -- 'ethereum' | 'polygon' | 'bsc' | 'bitcoin'
    derivation_path  TEXT NOT NULL,      -- "m/44'/60'/0'/0/0"
    supported_chains TEXT NOT NULL,      -- JSON array of chain ids
    metadata         TEXT,               -- JSON blob of device details
    is_active        BOOLEAN NOT NULL DEFAULT TRUE,   -- soft delete flag
    is_verified      BOOLEAN NOT NULL DEFAULT FALSE,  -- set by challenge-response verification
    last_used_at     INTEGER,            -- epoch seconds
    created_at       INTEGER NOT NULL    -- epoch seconds
);

-- Signing requests: one row per signing attempt
CREATE TABLE IF NOT EXISTS signing_requests (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          TEXT NOT NULL,
    association_id   INTEGER NOT NULL REFERENCES wallet_associations(id),
    status           TEXT NOT NULL DEFAULT 'pending',
    chain            TEXT NOT NULL,
    transaction_data TEXT NOT NULL,      -- JSON snapshot of the submitted transaction
    raw_data_to_sign TEXT NOT NULL,      -- written once at creation, never recomputed
    metadata         TEXT NOT NULL,      -- JSON: encoding, displayData, deviceType
    expires_at       INTEGER NOT NULL,   -- epoch seconds
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL,
    signature        TEXT,               -- set on completion
    public_key       TEXT,
    transaction_hash TEXT,
    error            TEXT                -- set on failure
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_associations_user ON wallet_associations(user_id, is_active);
CREATE INDEX IF NOT EXISTS idx_associations_device ON wallet_associations(device_id);

-- Open-request admission control and the expiry sweep both scan by status
CREATE INDEX IF NOT EXISTS idx_requests_user_status ON signing_requests(user_id, status);
CREATE INDEX IF NOT EXISTS idx_requests_association ON signing_requests(association_id);
CREATE INDEX IF NOT EXISTS idx_requests_expiry
ON signing_requests(expires_at) WHERE status IN ('pending', 'awaiting_device');

-- Meta table for key-value storage
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    val TEXT
);

INSERT OR IGNORE INTO meta (key, val) VALUES
    ('db_version', '1');
"#;
