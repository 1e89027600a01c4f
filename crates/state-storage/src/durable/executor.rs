//! Async SQLite executor using a dedicated background thread.
//!
//! All statements run in FIFO order on one thread owned by `tokio-rusqlite`.
//! Only SQL and light row mapping belong inside [`AsyncDatabase::call`];
//! snapshot serialization happens outside.
//!
//! ```ignore
//! let db = AsyncDatabase::open(path).await?;
//! let row = db.call(move |conn| queries::get_record(conn, &session, &name)).await?;
//! ```

use std::path::Path;

use tokio_rusqlite::Connection;
use tracing::{debug, info};

use super::migrations;
use crate::{StorageError, StorageResult};

fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> StorageError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => StorageError::Sqlite(e),
        tokio_rusqlite::Error::Close(_) => StorageError::Connection("Connection closed".to_string()),
        other => StorageError::Connection(other.to_string()),
    }
}

/// Async SQLite database with a dedicated executor thread.
#[derive(Clone)]
pub struct AsyncDatabase {
    conn: Connection,
    path: String,
}

impl AsyncDatabase {
    /// Open (creating if needed) the database at `path`, set WAL pragmas and
    /// run pending migrations.
    pub async fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let path_str = path.to_string_lossy().to_string();
        info!(path = %path_str, "Opening state database");

        let conn = Connection::open(&path_str)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Self::initialize(conn, path_str).await
    }

    /// In-memory database.
    pub async fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::initialize(conn, ":memory:".to_string()).await
    }

    async fn initialize(conn: Connection, path: String) -> StorageResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA temp_store = MEMORY;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;

        let db = Self { conn, path };
        db.call(migrations::run_migrations).await?;

        info!(path = %db.path, "State database ready");
        Ok(db)
    }

    /// Run `f` on the executor thread and await its result.
    pub async fn call<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let outer = self.conn.call(move |conn| Ok(f(conn))).await;
        match outer {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        self.call(|conn| {
            conn.execute_batch("SELECT 1")?;
            Ok(())
        })
        .await?;
        debug!(path = %self.path, "State database healthy");
        Ok(())
    }
}
