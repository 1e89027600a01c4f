//! SQL for `state_records`. Runs inside [`super::AsyncDatabase::call`].

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::StorageResult;

/// A stored row. `data` is the opaque serialized snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRecord {
    pub session_id: String,
    pub state_name: String,
    pub data: Vec<u8>,
    pub updated_at: String,
}

/// Fixed-width UTC timestamps so lexical order matches time order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn get_record(
    conn: &Connection,
    session_id: &str,
    state_name: &str,
) -> StorageResult<Option<StateRecord>> {
    let record = conn
        .query_row(
            "SELECT session_id, state_name, data, updated_at
             FROM state_records WHERE session_id = ?1 AND state_name = ?2",
            params![session_id, state_name],
            |row| {
                Ok(StateRecord {
                    session_id: row.get(0)?,
                    state_name: row.get(1)?,
                    data: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

pub fn upsert_record(
    conn: &Connection,
    session_id: &str,
    state_name: &str,
    data: &[u8],
    updated_at: &str,
) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO state_records (session_id, state_name, data, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(session_id, state_name) DO UPDATE SET data = ?3, updated_at = ?4",
        params![session_id, state_name, data, updated_at],
    )?;
    Ok(())
}

/// Delete rows last written before `cutoff`.
pub fn delete_older_than(conn: &Connection, cutoff: &str) -> StorageResult<u64> {
    let count = conn.execute(
        "DELETE FROM state_records WHERE updated_at < ?1",
        params![cutoff],
    )?;
    Ok(count as u64)
}

pub fn delete_session(conn: &Connection, session_id: &str) -> StorageResult<u64> {
    let count = conn.execute(
        "DELETE FROM state_records WHERE session_id = ?1",
        params![session_id],
    )?;
    Ok(count as u64)
}

pub fn count_records(conn: &Connection) -> StorageResult<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM state_records", [], |row| row.get(0))?;
    Ok(count as u64)
}
