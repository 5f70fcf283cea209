//! # Tagweight CLI (`tagw`)
//!
//! The `tagw` binary manages tagged documents and queries their tag
//! aggregates.
//!
//! ## Usage
//!
//! ```bash
//! tagw --config ./config/tagw.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tagw init` | Create the SQLite database and run schema migrations |
//! | `tagw types` | List configured types, contexts, and strategies |
//! | `tagw put <type>` | Create or update a document |
//! | `tagw delete <type> <id>` | Destroy a document |
//! | `tagw tags <type> <context>` | Distinct tags or tag weights for a context |
//! | `tagw tagged <type> <context> <tags>` | Documents carrying all given tags |
//! | `tagw reconcile <type> [context]` | Rewrite aggregation tables from the documents |
//! | `tagw stats` | Document and aggregation totals |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tagweight::{config, documents, migrate, reconcile, stats, tags, types};

/// Tagweight CLI: tag contexts for document collections with per-tag
/// weight aggregation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file that declares the database path and the taggable types.
#[derive(Parser)]
#[command(
    name = "tagw",
    about = "Tagweight: tag contexts and per-tag weight aggregation",
    version,
    long_about = "Tagweight stores documents with one or more tag contexts and keeps \
    per-tag weights current using a batch, incremental, or grouped incremental strategy."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tagw.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file with the documents and
    /// tag_aggregations tables. Safe to run repeatedly.
    Init,

    /// List configured types and their tag contexts.
    Types,

    /// Create or update a document.
    ///
    /// Fires the save hooks, so incremental aggregates are updated.
    Put {
        /// Document type name as configured in `[[types]]`.
        type_name: String,

        /// Document id. A new random id is used when omitted.
        #[arg(long)]
        id: Option<String>,

        /// Tag assignment as `context=value`; the value is split on the
        /// context separator.
        #[arg(long = "tags", value_parser = parse_key_val)]
        tags: Vec<(String, String)>,

        /// Plain field as `key=value`. JSON values are parsed, anything
        /// else is stored as a string.
        #[arg(long = "field", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,
    },

    /// Destroy a document.
    Delete {
        type_name: String,
        id: String,
    },

    /// Query the tags in use for a context.
    Tags {
        type_name: String,
        context: String,

        /// Restrict to one group (grouped contexts only).
        #[arg(long)]
        group: Option<String>,

        /// Include each tag's weight.
        #[arg(long)]
        weights: bool,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List documents carrying all of the given tags.
    Tagged {
        type_name: String,
        context: String,

        /// Tags, split on the context separator.
        tags: String,

        /// Print JSON instead of a listing.
        #[arg(long)]
        json: bool,
    },

    /// Rebuild aggregation tables from a full pass over the documents.
    Reconcile {
        type_name: String,

        /// Only this context. Defaults to every aggregated context.
        context: Option<String>,
    },

    /// Show document and aggregation totals.
    Stats,
}

/// Parse a `key=value` pair.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn init_tracing(cfg: &config::Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cfg.log.level.as_deref().unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Types => {
            types::list_types(&cfg)?;
        }
        Commands::Put {
            type_name,
            id,
            tags,
            fields,
        } => {
            documents::run_put(&cfg, &type_name, id, tags, fields).await?;
        }
        Commands::Delete { type_name, id } => {
            documents::run_delete(&cfg, &type_name, &id).await?;
        }
        Commands::Tags {
            type_name,
            context,
            group,
            weights,
            json,
        } => {
            tags::run_tags(&cfg, &type_name, &context, group, weights, json).await?;
        }
        Commands::Tagged {
            type_name,
            context,
            tags,
            json,
        } => {
            documents::run_tagged(&cfg, &type_name, &context, &tags, json).await?;
        }
        Commands::Reconcile { type_name, context } => {
            reconcile::run_reconcile(&cfg, &type_name, context.as_deref()).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
