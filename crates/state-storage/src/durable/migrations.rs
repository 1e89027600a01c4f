//! Schema migrations for the durable state table.
//!
//! Applied in order and tracked in the `migrations` table.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::StorageResult;

/// Current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> StorageResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    info!(current_version, target_version = CURRENT_VERSION, "Running state migrations");

    if current_version < 1 {
        migrate_v1_state_records(conn)?;
    }
    if current_version < 2 {
        migrate_v2_updated_at_index(conn)?;
    }

    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: one row per (session, state).
fn migrate_v1_state_records(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS state_records (
            session_id TEXT NOT NULL,
            state_name TEXT NOT NULL,
            data BLOB NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (session_id, state_name)
        );
        ",
    )?;
    record_migration(conn, 1, "state_records")
}

/// V2: the expiry sweep scans by age.
fn migrate_v2_updated_at_index(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_state_records_updated_at ON state_records(updated_at);",
    )?;
    record_migration(conn, 2, "state_records_updated_at_index")
}
