use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use fgraph::config::StorageConfig;
use fgraph::schema::SdlSchemaBuilder;
use fgraph::store::GraphStore;
use fgraph::FGraph;
use flotiqfetcher::client::{HttpTransport, ReqwestTransport};
use flotiqfetcher::{SyncOptions, SyncReport, SyncSession};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

const SYNC_TASK: &str = "flotiq_sync";

/// Runs the command line interface for the Flotiq source.
pub async fn run_cli() -> anyhow::Result<()> {
    init_tracing();
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("No subcommand provided. Use --help to see available commands.");
        return Ok(());
    };

    let graph = FGraph::new(StorageConfig::new(&cli.base_path))
        .with_context(|| format!("failed to open graph at {}", cli.base_path.display()))?;
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new());

    match command {
        Command::Sync(args) => {
            let mut options = load_options(&args.api)?;
            options.force_reload |= args.force_reload;
            if let Some(limit) = args.object_limit {
                options.object_limit = limit;
            }
            let outcome = sync_command(&graph, options, transport).await?;
            print_json(&outcome)?;
        }
        Command::Schema(args) => {
            let options = load_options(&args)?;
            println!("{}", schema_command(options, transport).await?);
        }
        Command::Nodes(args) => {
            for node in list_nodes(&graph, args.node_type.as_deref())? {
                if args.json {
                    println!("{}", serde_json::to_string(&node)?);
                } else {
                    println!("{}\t{}", node.id, node.node_type());
                }
            }
        }
        Command::Resolve(args) => {
            let options = load_options(&args.api)?;
            let targets = resolve_command(&graph, options, transport, &args.node, &args.field).await?;
            print_json(&targets)?;
        }
        Command::Runs(args) => {
            for log in graph.catalog.list_task_logs(args.limit)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    log.task_id, log.task_name, log.status, log.details
                );
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Directory holding the local graph database
    #[arg(long, env = "FSOURCE_BASE_PATH", default_value = ".fsource")]
    base_path: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Synchronizes Flotiq content into the local graph
    Sync(SyncArgs),
    /// Prints the GraphQL schema derived from the content type catalog
    Schema(ApiArgs),
    /// Lists nodes stored in the local graph
    Nodes(NodesArgs),
    /// Resolves a relation field of a stored node
    Resolve(ResolveArgs),
    /// Lists recent sync runs
    Runs(RunsArgs),
}

/// Where the sync options come from. Flags and environment override the file.
#[derive(Args, Clone, Debug, Default)]
pub struct ApiArgs {
    /// JSON file with plugin options (baseUrl, authToken, includeTypes, ...)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Flotiq API url
    #[arg(long, env = "FLOTIQ_API_URL")]
    pub base_url: Option<String>,
    /// Flotiq API key
    #[arg(long, env = "FLOTIQ_API_KEY", hide_env_values = true)]
    pub auth_token: Option<String>,
    /// Only synchronize these content types
    #[arg(long, value_delimiter = ',')]
    pub include_types: Vec<String>,
}

#[derive(Args)]
struct SyncArgs {
    #[command(flatten)]
    api: ApiArgs,
    /// Ignore the stored watermark and download everything
    #[arg(long, default_value_t = false)]
    force_reload: bool,
    /// Maximum number of objects per content type
    #[arg(long)]
    object_limit: Option<u64>,
}

#[derive(Args)]
struct NodesArgs {
    /// Only list nodes of this type
    #[arg(long)]
    node_type: Option<String>,
    /// Print full nodes as JSON lines
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args)]
struct ResolveArgs {
    #[command(flatten)]
    api: ApiArgs,
    /// Id of the node holding the relation
    #[arg(long)]
    node: String,
    /// Relation field name
    #[arg(long)]
    field: String,
}

#[derive(Args)]
struct RunsArgs {
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Builds the sync options from the optional config file, then applies
/// flag and environment overrides.
pub fn load_options(args: &ApiArgs) -> anyhow::Result<SyncOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<SyncOptions>(&raw)
                .with_context(|| format!("invalid options in {}", path.display()))?
        }
        None => SyncOptions::default(),
    };
    if let Some(base_url) = &args.base_url {
        options.base_url = base_url.clone();
    }
    if let Some(auth_token) = &args.auth_token {
        options.auth_token = auth_token.clone();
    }
    if !args.include_types.is_empty() {
        options.include_types = Some(json!(args.include_types));
    }
    Ok(options)
}

#[derive(Debug, Serialize)]
pub struct SyncOutcome {
    #[serde(flatten)]
    pub report: SyncReport,
    pub stale_removed: usize,
}

/// Runs one sync against the SQLite graph, recording it in the run log.
/// After a successful run, nodes the run neither touched nor created are
/// collected. Flotiq nodes are always touched, so this only clears nodes
/// left by other owners.
pub async fn sync_command(
    graph: &FGraph,
    options: SyncOptions,
    transport: Arc<dyn HttpTransport>,
) -> anyhow::Result<SyncOutcome> {
    let task_id = graph.catalog.create_task_log(SYNC_TASK)?;
    let started_at = chrono::Utc::now().timestamp_millis();

    let result = async {
        let mut session = SyncSession::new(options, transport)?;
        session.load_catalog().await?;
        session.register_types(&mut SdlSchemaBuilder::new())?;
        session
            .source_nodes(graph.store.as_ref(), graph.catalog.as_ref())
            .await
    }
    .await;

    match result {
        Ok(report) => {
            let stale_removed = graph.store.collect_stale(started_at)?;
            let outcome = SyncOutcome {
                report,
                stale_removed,
            };
            graph.catalog.update_task_log_status(
                task_id,
                "SUCCESS",
                &serde_json::to_string(&outcome)?,
            )?;
            info!(
                "Sync run {} stored {} change(s), removed {}",
                task_id, outcome.report.changed, outcome.report.removed
            );
            Ok(outcome)
        }
        Err(err) => {
            error!("Sync run {} failed: {}", task_id, err);
            graph.catalog.update_task_log_status(
                task_id,
                "FAILED",
                &json!({ "error": err.to_string() }).to_string(),
            )?;
            Err(err).context("Flotiq sync failed")
        }
    }
}

/// Renders the schema the current catalog projects to.
pub async fn schema_command(
    options: SyncOptions,
    transport: Arc<dyn HttpTransport>,
) -> anyhow::Result<String> {
    let mut session = SyncSession::new(options, transport)?;
    session.load_catalog().await?;
    let mut builder = SdlSchemaBuilder::new();
    session.register_types(&mut builder)?;
    Ok(builder.render())
}

pub fn list_nodes(
    graph: &FGraph,
    node_type: Option<&str>,
) -> anyhow::Result<Vec<fgraph::models::GraphNode>> {
    let mut nodes = graph.store.get_nodes()?;
    if let Some(node_type) = node_type {
        nodes.retain(|node| node.node_type() == node_type);
    }
    Ok(nodes)
}

/// Resolves `field` of the stored node `node_id`, fetching missing targets
/// when the options allow it.
pub async fn resolve_command(
    graph: &FGraph,
    options: SyncOptions,
    transport: Arc<dyn HttpTransport>,
    node_id: &str,
    field: &str,
) -> anyhow::Result<Vec<JsonValue>> {
    let Some(node) = graph.store.get_node(node_id)? else {
        bail!("node '{}' not found", node_id);
    };
    let mut session = SyncSession::new(options, transport)?;
    session.load_catalog().await?;

    let store: Arc<dyn GraphStore> = graph.store.clone();
    let targets = session.resolver(store).resolve_field(&node, field).await?;
    targets
        .into_iter()
        .map(|target| serde_json::to_value(target).map_err(anyhow::Error::from))
        .collect()
}
