use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::entities::device::KnownDevice;
use crate::domain::entities::dispatch::DispatchRecord;
use crate::domain::ports::store::{DevicePreferenceStore, DispatchLogStore, StoreError};

use super::migrations;

const LAST_KNOWN_DEVICE: &str = "last_known_device";
const AUTO_CONNECT_ENABLED: &str = "auto_connect_enabled";

/// SQLite-backed store for device preferences and the dispatch log.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new `SQLite` store at the given path.
    ///
    /// Expands `~`, creates parent directories, opens connection,
    /// sets WAL mode and pragmas, and initializes schema.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the database cannot be opened or initialized.
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let expanded = shellexpand::tilde(path);
        let db_path = PathBuf::from(expanded.as_ref());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        }

        let conn =
            Connection::open(&db_path).map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        migrations::initialize_schema(&conn).map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn get_pref(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;
        conn.query_row(
            "SELECT value FROM device_preferences WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::ReadFailed(e.to_string()))
    }

    fn set_pref(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;
        conn.execute(
            "INSERT INTO device_preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}

impl DevicePreferenceStore for SqliteStore {
    fn last_known_device(&self) -> Result<Option<KnownDevice>, StoreError> {
        self.get_pref(LAST_KNOWN_DEVICE)?
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| StoreError::ReadFailed(e.to_string()))
            })
            .transpose()
    }

    fn set_last_known_device(&self, device: &KnownDevice) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(device).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        self.set_pref(LAST_KNOWN_DEVICE, &json)
    }

    fn auto_connect_enabled(&self) -> Result<Option<bool>, StoreError> {
        Ok(self.get_pref(AUTO_CONNECT_ENABLED)?.map(|v| v == "true"))
    }

    fn set_auto_connect_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.set_pref(AUTO_CONNECT_ENABLED, if enabled { "true" } else { "false" })
    }
}

impl DispatchLogStore for SqliteStore {
    fn record_dispatch(&self, record: &DispatchRecord) -> Result<(), StoreError> {
        let data =
            serde_json::to_string(record).map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))?;
        conn.execute(
            "INSERT INTO dispatch_log (dispatched_at, source, overall_success, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.result.dispatched_at.to_rfc3339(),
                record.source.to_string(),
                record.result.overall_success,
                data
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn recent_dispatches(&self, count: usize) -> Result<Vec<DispatchRecord>, StoreError> {
        let limit = i64::try_from(count).map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?;

        let mut stmt = conn
            .prepare("SELECT data FROM dispatch_log ORDER BY id DESC LIMIT ?1")
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let data = row.map_err(|e| StoreError::ReadFailed(e.to_string()))?;
            match serde_json::from_str::<DispatchRecord>(&data) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable dispatch log entry: {e}"),
            }
        }
        Ok(records)
    }
}
