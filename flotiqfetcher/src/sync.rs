//! One synchronization run.
//!
//! A [`SyncSession`] is created per invocation and carries everything the
//! phases share: validated options, the API client, the catalog snapshot and
//! the schema computed from it.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use fgraph::models::PluginStatus;
use fgraph::schema::SchemaBuilder;
use fgraph::store::{GraphStore, PluginStatusStore};
use serde::Serialize;

use crate::client::{FlotiqClient, HttpTransport, ReqwestTransport};
use crate::content::fetch_content_objects;
use crate::content_types::get_content_types;
use crate::error::{FlotiqError, Result};
use crate::mapper::{node_id, object_to_node, OWNER};
use crate::models::ContentTypeDefinition;
use crate::params::SyncOptions;
use crate::projector::{self, SchemaPlan};
use crate::removed::get_deleted_objects;
use crate::resolver::ReferenceResolver;

/// Plugin key the watermark is stored under.
pub const PLUGIN_NAME: &str = OWNER;

pub const WATERMARK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    Init,
    CatalogFetched,
    SchemaRegistered,
    Reconciling,
    Fetching,
    WatermarkAdvanced,
    Done,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub content_types: usize,
    /// Watermark the run started from; `None` for a full sync.
    pub since: Option<String>,
    pub changed: usize,
    pub removed: usize,
    pub touched: usize,
    pub watermark: String,
    /// Media nodes the host should mirror locally.
    pub media_to_download: Vec<String>,
}

pub struct SyncSession {
    options: SyncOptions,
    client: FlotiqClient,
    state: SyncState,
    content_types: Vec<ContentTypeDefinition>,
    schema: Option<SchemaPlan>,
}

impl SyncSession {
    /// Validates the options. Nothing is requested before this succeeds.
    pub fn new(options: SyncOptions, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        options.validate()?;
        let client = FlotiqClient::new(&options, transport);
        Ok(Self {
            options,
            client,
            state: SyncState::Init,
            content_types: Vec::new(),
            schema: None,
        })
    }

    pub fn with_default_transport(options: SyncOptions) -> Result<Self> {
        Self::new(options, Arc::new(ReqwestTransport::new()))
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn client(&self) -> &FlotiqClient {
        &self.client
    }

    pub fn content_types(&self) -> &[ContentTypeDefinition] {
        &self.content_types
    }

    pub fn schema(&self) -> Option<&SchemaPlan> {
        self.schema.as_ref()
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.state = SyncState::Failed;
        }
        result
    }

    /// Fetches the catalog and computes the schema plan from it.
    pub async fn load_catalog(&mut self) -> Result<&SchemaPlan> {
        let loaded = get_content_types(&self.client, &self.options).await;
        let content_types = self.track(loaded)?;
        // The loader already applied the allow-list.
        let plan = projector::project(&content_types, None);

        self.content_types = content_types;
        self.state = SyncState::CatalogFetched;
        Ok(self.schema.insert(plan))
    }

    /// Registers the plan computed by [`SyncSession::load_catalog`].
    pub fn register_types(&mut self, builder: &mut dyn SchemaBuilder) -> Result<()> {
        let registered = match &self.schema {
            Some(plan) => projector::register(plan, builder),
            None => Err(FlotiqError::Internal(
                "types registered before the catalog was loaded".to_string(),
            )),
        };
        self.track(registered)?;
        self.state = SyncState::SchemaRegistered;
        Ok(())
    }

    /// Brings the graph up to date with the remote content and advances the
    /// watermark. On error the watermark is left untouched.
    pub async fn source_nodes(
        &mut self,
        store: &dyn GraphStore,
        status: &dyn PluginStatusStore,
    ) -> Result<SyncReport> {
        if self.state == SyncState::Init {
            self.load_catalog().await?;
        }
        let outcome = self.run_phases(store, status).await;
        let report = self.track(outcome)?;
        self.state = SyncState::Done;
        log::info!(
            "Sync finished: {} changed, {} removed, {} touched",
            report.changed,
            report.removed,
            report.touched
        );
        Ok(report)
    }

    async fn run_phases(
        &mut self,
        store: &dyn GraphStore,
        status: &dyn PluginStatusStore,
    ) -> Result<SyncReport> {
        let existing: Vec<String> = store
            .get_nodes()?
            .into_iter()
            .filter(|node| node.is_owned_by(OWNER))
            .map(|node| node.id)
            .collect();

        // A watermark is only meaningful while the nodes it describes exist.
        let since = if self.options.force_reload || existing.is_empty() {
            if self.options.force_reload {
                log::info!("Force reload requested, running a full sync");
            }
            status.set_plugin_status(PLUGIN_NAME, &PluginStatus::default())?;
            None
        } else {
            status
                .plugin_status(PLUGIN_NAME)?
                .and_then(|status| status.updated_at)
        };

        for id in &existing {
            store.touch_node(id)?;
        }

        let mut report = SyncReport {
            content_types: self.content_types.len(),
            since: since.clone(),
            touched: existing.len(),
            ..SyncReport::default()
        };

        self.state = SyncState::Reconciling;
        if let Some(since) = since.as_deref() {
            report.removed = get_deleted_objects(
                &self.client,
                &self.options,
                since,
                &self.content_types,
                |ctd, id| {
                    let target = node_id(&ctd.name, id);
                    if !store.delete_node(&target)? {
                        log::debug!("Removed object {} had no local node", target);
                    }
                    Ok(())
                },
            )
            .await?;
        }

        self.state = SyncState::Fetching;
        let media = Mutex::new(Vec::new());
        let collect_media = self.options.download_media_file;
        let base_url = self.client.base_url();
        report.changed = fetch_content_objects(
            &self.client,
            store,
            &self.options,
            since.as_deref(),
            &self.content_types,
            |ctd, object| {
                let node = object_to_node(ctd, &object, base_url)?;
                if collect_media && ctd.is_media() {
                    if let Ok(mut ids) = media.lock() {
                        ids.push(node.id.clone());
                    }
                }
                store.create_node(node)?;
                Ok(())
            },
        )
        .await?;
        report.media_to_download = media.into_inner().unwrap_or_default();

        let watermark = Utc::now().format(WATERMARK_FORMAT).to_string();
        status.set_plugin_status(
            PLUGIN_NAME,
            &PluginStatus {
                updated_at: Some(watermark.clone()),
            },
        )?;
        report.watermark = watermark;
        self.state = SyncState::WatermarkAdvanced;
        Ok(report)
    }

    /// Resolver over `store` using this session's client and catalog.
    pub fn resolver(&self, store: Arc<dyn GraphStore>) -> ReferenceResolver {
        ReferenceResolver::new(
            self.client.clone(),
            store,
            &self.content_types,
            self.options.resolve_missing_relations,
        )
    }
}

/// Runs every phase of a sync against one host.
pub async fn run_sync(
    options: SyncOptions,
    transport: Arc<dyn HttpTransport>,
    builder: &mut dyn SchemaBuilder,
    store: &dyn GraphStore,
    status: &dyn PluginStatusStore,
) -> Result<SyncReport> {
    let mut session = SyncSession::new(options, transport)?;
    session.load_catalog().await?;
    session.register_types(builder)?;
    session.source_nodes(store, status).await
}
