pub mod catalog;
pub mod config;
pub mod errors;
pub mod models;
pub mod schema;
pub mod store;

use crate::catalog::Catalog;
use crate::config::StorageConfig;
use crate::errors::Result;
use crate::store::SqliteGraphStore;
use std::sync::Arc;

/// The main entry point for the `fgraph` library.
///
/// `FGraph` is the host side of a source plugin: it owns the local node graph
/// and the bookkeeping that survives between sync runs.
/// - A metadata database (`Catalog`) using SQLite to keep plugin status and run logs.
/// - A node store (`SqliteGraphStore`) sharing the catalog connection.
///
/// # Example
///
/// ```rust,no_run
/// use fgraph::{FGraph, config::StorageConfig};
///
/// let graph = FGraph::new(StorageConfig::new("./.flotiq")).unwrap();
/// // Hand `graph.store` and `graph.catalog` to a source plugin.
/// ```
pub struct FGraph {
    pub config: StorageConfig,
    pub catalog: Arc<Catalog>,
    pub store: Arc<SqliteGraphStore>,
}

impl FGraph {
    /// Opens (or creates) the catalog database and its tables.
    pub fn new(config: StorageConfig) -> Result<Self> {
        let catalog = Arc::new(Catalog::new(&config)?);
        catalog.initialize_schema()?;

        let store = Arc::new(SqliteGraphStore::new(catalog.connection()));

        Ok(Self {
            config,
            catalog,
            store,
        })
    }
}
