use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Host bookkeeping attached to every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInternal {
    #[serde(rename = "type")]
    pub node_type: String,
    pub content_digest: String,
    pub owner: String,
}

/// A node in the local graph. Projected field values live in `fields` and are
/// flattened next to the structural keys when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    pub internal: NodeInternal,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl GraphNode {
    pub fn node_type(&self) -> &str {
        &self.internal.node_type
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.internal.owner == owner
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Per-plugin state the host keeps between invocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginStatus {
    pub updated_at: Option<String>,
}

// --- Metadata Catalog (SQLite) Models ---

#[derive(Debug, Clone, Serialize)]
pub struct TaskLog {
    pub task_id: i64,
    pub task_name: String,
    pub start_time: i64, // Unix timestamp
    pub end_time: Option<i64>,
    pub status: String,
    pub details: String, // JSON string
}
