use crate::config::StorageConfig;
use crate::errors::{Result, StorageError};
use crate::models::{PluginStatus, TaskLog};
use crate::store::PluginStatusStore;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct Catalog {
    conn: Arc<Mutex<Connection>>,
}

impl Catalog {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.base_path)?;
        let conn = Connection::open(&config.catalog_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Shared handle for stores that keep their tables in the catalog database.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::poisoned())
    }

    pub fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS plugin_status (
                plugin TEXT PRIMARY KEY,
                status TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                node_type TEXT NOT NULL,
                owner TEXT NOT NULL,
                content_digest TEXT NOT NULL,
                body TEXT NOT NULL,
                touched_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS nodes_by_type ON nodes (node_type);
            CREATE TABLE IF NOT EXISTS task_logs (
                task_id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_name TEXT,
                start_time INTEGER NOT NULL,
                end_time INTEGER,
                status TEXT,
                details TEXT
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn create_task_log(&self, task_name: &str) -> Result<i64> {
        let conn = self.lock()?;
        let start_time = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO task_logs (task_name, start_time, status) VALUES (?1, ?2, 'RUNNING')",
            params![task_name, start_time],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_task_log_status(&self, task_id: i64, status: &str, details: &str) -> Result<()> {
        let conn = self.lock()?;
        let end_time = chrono::Utc::now().timestamp();
        let updated = conn.execute(
            "UPDATE task_logs SET status = ?1, details = ?2, end_time = ?3 WHERE task_id = ?4",
            params![status, details, end_time, task_id],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("task log {task_id}")));
        }
        Ok(())
    }

    /// Most recent runs first.
    pub fn list_task_logs(&self, limit: usize) -> Result<Vec<TaskLog>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT task_id, task_name, start_time, end_time, status, details
             FROM task_logs ORDER BY task_id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(TaskLog {
                task_id: row.get(0)?,
                task_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                start_time: row.get(2)?,
                end_time: row.get(3)?,
                status: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                details: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            })
        })?;
        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?);
        }
        Ok(logs)
    }
}

impl PluginStatusStore for Catalog {
    fn plugin_status(&self, plugin: &str) -> Result<Option<PluginStatus>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT status FROM plugin_status WHERE plugin = ?1",
                params![plugin],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| serde_json::from_str(&raw).map_err(StorageError::from))
            .transpose()
    }

    fn set_plugin_status(&self, plugin: &str, status: &PluginStatus) -> Result<()> {
        let conn = self.lock()?;
        let raw = serde_json::to_string(status)?;
        conn.execute(
            "INSERT INTO plugin_status (plugin, status) VALUES (?1, ?2)
             ON CONFLICT(plugin) DO UPDATE SET status = excluded.status",
            params![plugin, raw],
        )?;
        Ok(())
    }
}
