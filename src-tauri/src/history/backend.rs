use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::PersistenceError;

/// Key under which the serialized history log is stored.
pub const HISTORY_KEY: &str = "caption_history";

/// Durable storage for the serialized history log: one named record.
pub trait HistoryBackend: Send {
    /// Read the stored payload, `None` if nothing has been written yet.
    fn read(&self) -> Result<Option<String>, PersistenceError>;

    /// Replace the stored payload.
    fn write(&self, payload: &str) -> Result<(), PersistenceError>;

    /// Remove the stored payload entirely.
    fn remove(&self) -> Result<(), PersistenceError>;
}

/// SQLite-backed key-value store.
/// All operations are synchronous (rusqlite is blocking).
pub struct SqliteBackend {
    conn: Connection,
    key: String,
}

impl SqliteBackend {
    /// Create or open the history database.
    /// Typically called with: app.path().app_data_dir()?.join("caption_history.db")
    pub fn open(db_path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PersistenceError::Open(format!("Failed to create data dir: {}", e)))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| PersistenceError::Open(format!("{:?}: {}", db_path, e)))?;
        let backend = Self::with_connection(conn)?;

        info!("Opened caption history database at {:?}", db_path);
        Ok(backend)
    }

    /// History that lives only as long as the process.
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(|e| PersistenceError::Open(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )
        .map_err(|e| PersistenceError::Open(format!("Failed to create table: {}", e)))?;

        Ok(Self {
            conn,
            key: HISTORY_KEY.to_string(),
        })
    }
}

impl HistoryBackend for SqliteBackend {
    fn read(&self) -> Result<Option<String>, PersistenceError> {
        self.conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![self.key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| PersistenceError::Read(e.to_string()))
    }

    fn write(&self, payload: &str) -> Result<(), PersistenceError> {
        self.conn
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![self.key, payload],
            )
            .map_err(|e| PersistenceError::Write(e.to_string()))?;
        Ok(())
    }

    fn remove(&self) -> Result<(), PersistenceError> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![self.key])
            .map_err(|e| PersistenceError::Write(e.to_string()))?;
        Ok(())
    }
}
