use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::{Result, StorageError};
use crate::models::{GraphNode, PluginStatus};

/// Node mutation and lookup operations a source plugin needs from the host graph.
pub trait GraphStore: Send + Sync {
    /// Inserts the node, replacing any node with the same id.
    fn create_node(&self, node: GraphNode) -> Result<()>;
    /// Returns `false` when no node with that id existed.
    fn delete_node(&self, node_id: &str) -> Result<bool>;
    /// Marks a node as still valid for the current run.
    fn touch_node(&self, node_id: &str) -> Result<()>;
    fn get_node(&self, node_id: &str) -> Result<Option<GraphNode>>;
    fn get_nodes(&self) -> Result<Vec<GraphNode>>;
    fn count_nodes_by_type(&self, node_type: &str) -> Result<usize>;
}

/// Status values the host persists per plugin across invocations.
pub trait PluginStatusStore: Send + Sync {
    fn plugin_status(&self, plugin: &str) -> Result<Option<PluginStatus>>;
    fn set_plugin_status(&self, plugin: &str, status: &PluginStatus) -> Result<()>;
}

/// One recorded mutation against a [`MemoryGraphStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Create(String),
    Delete(String),
    Touch(String),
}

/// In-process store. Records every mutation so callers can audit a run.
#[derive(Default)]
pub struct MemoryGraphStore {
    nodes: RwLock<BTreeMap<String, GraphNode>>,
    statuses: Mutex<HashMap<String, PluginStatus>>,
    ops: Mutex<Vec<StoreOp>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: impl IntoIterator<Item = GraphNode>) -> Self {
        let store = Self::default();
        if let Ok(mut map) = store.nodes.write() {
            for node in nodes {
                map.insert(node.id.clone(), node);
            }
        }
        store
    }

    pub fn operations(&self) -> Vec<StoreOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    pub fn count_ops(&self, pred: impl Fn(&StoreOp) -> bool) -> usize {
        self.operations().iter().filter(|op| pred(op)).count()
    }

    fn record(&self, op: StoreOp) -> Result<()> {
        self.ops
            .lock()
            .map_err(|_| StorageError::poisoned())?
            .push(op);
        Ok(())
    }
}

impl GraphStore for MemoryGraphStore {
    fn create_node(&self, node: GraphNode) -> Result<()> {
        let id = node.id.clone();
        self.nodes
            .write()
            .map_err(|_| StorageError::poisoned())?
            .insert(id.clone(), node);
        self.record(StoreOp::Create(id))
    }

    fn delete_node(&self, node_id: &str) -> Result<bool> {
        let removed = self
            .nodes
            .write()
            .map_err(|_| StorageError::poisoned())?
            .remove(node_id)
            .is_some();
        self.record(StoreOp::Delete(node_id.to_string()))?;
        Ok(removed)
    }

    fn touch_node(&self, node_id: &str) -> Result<()> {
        self.record(StoreOp::Touch(node_id.to_string()))
    }

    fn get_node(&self, node_id: &str) -> Result<Option<GraphNode>> {
        Ok(self
            .nodes
            .read()
            .map_err(|_| StorageError::poisoned())?
            .get(node_id)
            .cloned())
    }

    fn get_nodes(&self) -> Result<Vec<GraphNode>> {
        Ok(self
            .nodes
            .read()
            .map_err(|_| StorageError::poisoned())?
            .values()
            .cloned()
            .collect())
    }

    fn count_nodes_by_type(&self, node_type: &str) -> Result<usize> {
        Ok(self
            .nodes
            .read()
            .map_err(|_| StorageError::poisoned())?
            .values()
            .filter(|node| node.node_type() == node_type)
            .count())
    }
}

impl PluginStatusStore for MemoryGraphStore {
    fn plugin_status(&self, plugin: &str) -> Result<Option<PluginStatus>> {
        Ok(self
            .statuses
            .lock()
            .map_err(|_| StorageError::poisoned())?
            .get(plugin)
            .cloned())
    }

    fn set_plugin_status(&self, plugin: &str, status: &PluginStatus) -> Result<()> {
        self.statuses
            .lock()
            .map_err(|_| StorageError::poisoned())?
            .insert(plugin.to_string(), status.clone());
        Ok(())
    }
}

/// Node store backed by the `nodes` table of the catalog database.
pub struct SqliteGraphStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGraphStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::poisoned())
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Deletes nodes, whatever their owner, that were neither created nor
    /// touched since `since_millis`. A source touches every node it owns on
    /// each run, so after a successful run this only drops nodes left behind
    /// by owners that no longer sync into this graph.
    pub fn collect_stale(&self, since_millis: i64) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM nodes WHERE touched_at < ?1",
            params![since_millis],
        )?;
        if removed > 0 {
            log::info!("Collected {} stale node(s)", removed);
        }
        Ok(removed)
    }

    fn decode(body: String) -> Result<GraphNode> {
        Ok(serde_json::from_str(&body)?)
    }
}

impl GraphStore for SqliteGraphStore {
    fn create_node(&self, node: GraphNode) -> Result<()> {
        let body = serde_json::to_string(&node)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO nodes (id, node_type, owner, content_digest, body, touched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                node_type = excluded.node_type,
                owner = excluded.owner,
                content_digest = excluded.content_digest,
                body = excluded.body,
                touched_at = excluded.touched_at",
            params![
                node.id,
                node.internal.node_type,
                node.internal.owner,
                node.internal.content_digest,
                body,
                Self::now_millis(),
            ],
        )?;
        Ok(())
    }

    fn delete_node(&self, node_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM nodes WHERE id = ?1", params![node_id])?;
        Ok(removed > 0)
    }

    fn touch_node(&self, node_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE nodes SET touched_at = ?1 WHERE id = ?2",
            params![Self::now_millis(), node_id],
        )?;
        Ok(())
    }

    fn get_node(&self, node_id: &str) -> Result<Option<GraphNode>> {
        let body: Option<String> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT body FROM nodes WHERE id = ?1",
                params![node_id],
                |row| row.get(0),
            )
            .optional()?
        };
        body.map(Self::decode).transpose()
    }

    fn get_nodes(&self) -> Result<Vec<GraphNode>> {
        let bodies = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare("SELECT body FROM nodes ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        bodies.into_iter().map(Self::decode).collect()
    }

    fn count_nodes_by_type(&self, node_type: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE node_type = ?1",
            params![node_type],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
