//! shardtopo CLI - Admin Command Line Interface
//!
//! Inspects and edits keyspace and shard records in a redb-backed topology.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use shardtopo::{
    FindAllShardsOptions, Keyspace, KeyspaceInfo, MemoryLocker, RedbConn, ShardInfo, TopoServer,
    TracingSink,
};
use shardtopo_common::{TabletType, TopoConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "shardtopo-cli")]
#[command(about = "shardtopo Admin CLI")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML); missing files are ignored
    #[arg(short, long, default_value = "/etc/shardtopo/topo.toml")]
    config: String,

    /// Topology database path, overrides the configuration
    #[arg(long, env = "SHARDTOPO_STORE")]
    store: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Keyspace operations
    Keyspace {
        #[command(subcommand)]
        action: KeyspaceCommands,
    },
    /// Shard operations
    Shard {
        #[command(subcommand)]
        action: ShardCommands,
    },
    /// Served-from migration operations
    ServedFrom {
        #[command(subcommand)]
        action: ServedFromCommands,
    },
}

#[derive(Subcommand, Debug)]
enum KeyspaceCommands {
    /// List all keyspaces
    List,
    /// Show a keyspace record
    Get {
        /// Keyspace name
        name: String,
    },
    /// Create a keyspace
    Create {
        /// Keyspace name
        name: String,
        /// Durability policy
        #[arg(long, default_value = "")]
        durability_policy: String,
        /// Sidecar database name
        #[arg(long, default_value = "")]
        sidecar_db_name: String,
    },
    /// Delete a keyspace and its routing schema
    Delete {
        /// Keyspace name
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum ShardCommands {
    /// Create a shard, e.g. `-80` or `80-`
    Create {
        keyspace: String,
        shard: String,
    },
    /// List every shard of a keyspace
    List {
        keyspace: String,
        /// Concurrent shard reads
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// List the serving shards of a keyspace
    Serving { keyspace: String },
    /// Show the single shard of an unsharded keyspace
    Only { keyspace: String },
}

#[derive(Subcommand, Debug)]
enum ServedFromCommands {
    /// Show the served-from records of a keyspace
    Show {
        keyspace: String,
        /// Only the records that apply to this cell
        #[arg(long)]
        cell: Option<String>,
    },
    /// Add or remove a served-from record
    Migrate {
        /// Keyspace being migrated into
        keyspace: String,
        /// Tablet type to migrate
        #[arg(long)]
        tablet_type: TabletType,
        /// Keyspace traffic is served from
        #[arg(long)]
        source: String,
        /// Cells to migrate (empty means all)
        #[arg(long, value_delimiter = ',')]
        cells: Vec<String>,
        /// Every cell of the deployment
        #[arg(long, value_delimiter = ',')]
        all_cells: Vec<String>,
        /// Stop serving from the source keyspace
        #[arg(long)]
        remove: bool,
    },
}

/// Settings read from the configuration file and `SHARDTOPO__*` variables
#[derive(Debug, Deserialize)]
#[serde(default)]
struct CliConfig {
    store_path: PathBuf,
    topo: TopoConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("/var/lib/shardtopo/topo.redb"),
            topo: TopoConfig::default(),
        }
    }
}

fn load_config(path: &str) -> Result<CliConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("SHARDTOPO").separator("__"))
        .build()
        .with_context(|| format!("Failed to load configuration from {path}"))?;
    settings
        .try_deserialize()
        .context("Invalid configuration")
}

fn keyspace_json(info: &KeyspaceInfo) -> serde_json::Value {
    json!({
        "name": info.name(),
        "version": info.version(),
        "keyspace": &**info,
    })
}

fn shard_json(info: &ShardInfo) -> serde_json::Value {
    json!({
        "keyspace": info.keyspace(),
        "name": info.shard_name(),
        "version": info.version(),
        "key_range": info.key_range.as_ref().map(ToString::to_string),
        "is_primary_serving": info.is_primary_serving,
        "primary_alias": info.primary_alias.as_ref().map(ToString::to_string),
    })
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_keyspace(ts: &TopoServer, action: KeyspaceCommands) -> Result<()> {
    match action {
        KeyspaceCommands::List => {
            for name in ts.get_keyspaces().await? {
                println!("{name}");
            }
        }
        KeyspaceCommands::Get { name } => {
            let info = ts.get_keyspace(&name).await?;
            print_json(&keyspace_json(&info))?;
        }
        KeyspaceCommands::Create {
            name,
            durability_policy,
            sidecar_db_name,
        } => {
            let keyspace = Keyspace {
                durability_policy,
                sidecar_db_name,
                ..Keyspace::default()
            };
            ts.create_keyspace(&name, keyspace).await?;
            println!("Keyspace '{name}' created");
        }
        KeyspaceCommands::Delete { name } => {
            ts.delete_keyspace(&name).await?;
            println!("Keyspace '{name}' deleted");
        }
    }
    Ok(())
}

async fn run_shard(ts: &TopoServer, action: ShardCommands) -> Result<()> {
    match action {
        ShardCommands::Create { keyspace, shard } => {
            let si = ts.create_shard(&keyspace, &shard).await?;
            print_json(&shard_json(&si))?;
        }
        ShardCommands::List {
            keyspace,
            concurrency,
        } => {
            let shards = ts
                .find_all_shards_in_keyspace(&keyspace, FindAllShardsOptions { concurrency })
                .await?;
            let out: Vec<_> = shards.values().map(shard_json).collect();
            print_json(&json!(out))?;
        }
        ShardCommands::Serving { keyspace } => {
            let shards = ts.get_serving_shards(&keyspace).await?;
            let out: Vec<_> = shards.iter().map(shard_json).collect();
            print_json(&json!(out))?;
        }
        ShardCommands::Only { keyspace } => {
            let si = ts.get_only_shard(&keyspace).await?;
            print_json(&shard_json(&si))?;
        }
    }
    Ok(())
}

async fn run_served_from(ts: &TopoServer, action: ServedFromCommands) -> Result<()> {
    match action {
        ServedFromCommands::Show { keyspace, cell } => {
            let info = ts.get_keyspace(&keyspace).await?;
            match cell {
                Some(cell) => {
                    for sf in info.compute_cell_served_from(&cell) {
                        println!("{:<12} {}", sf.tablet_type, sf.keyspace);
                    }
                }
                None => print_json(&json!(info.served_froms))?,
            }
        }
        ServedFromCommands::Migrate {
            keyspace,
            tablet_type,
            source,
            cells,
            all_cells,
            remove,
        } => {
            let guard = ts
                .lock_keyspace(&keyspace, "served-from migration")
                .await?;
            let mut info = ts.get_keyspace(&keyspace).await?;
            info.update_served_from_map(tablet_type, &cells, &source, remove, &all_cells)?;
            ts.update_keyspace(&guard, &mut info).await?;
            info!(keyspace = %keyspace, %tablet_type, remove, "served-from updated");
            print_json(&json!(info.served_froms))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut cfg = load_config(&args.config)?;
    if let Some(store) = args.store {
        cfg.store_path = store;
    }

    let conn = RedbConn::open(&cfg.store_path)
        .with_context(|| format!("Failed to open topology store {}", cfg.store_path.display()))?;
    let locker = MemoryLocker::new(cfg.topo.lock_timeout());
    let ts = TopoServer::new(Arc::new(conn), Arc::new(locker), cfg.topo)?
        .with_event_sink(Arc::new(TracingSink));

    match args.command {
        Commands::Keyspace { action } => run_keyspace(&ts, action).await,
        Commands::Shard { action } => run_shard(&ts, action).await,
        Commands::ServedFrom { action } => run_served_from(&ts, action).await,
    }
}
