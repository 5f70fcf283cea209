//! TOML configuration: database location, log level, and the taggable
//! document types with their contexts.
//!
//! ```toml
//! [db]
//! path = "./data/tagw.sqlite"
//!
//! [[types]]
//! name = "Track"
//! strategy = "incremental"
//!
//! [[types.contexts]]
//! name = "artists"
//! group_by_field = "user"
//! strategy = "incremental_grouped"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tagweight_core::{ContextOptions, StrategyKind};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub types: Vec<TypeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Pool size. Counter updates from concurrent saves share it.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub level: Option<String>,
}

/// One taggable document type.
#[derive(Debug, Deserialize, Clone)]
pub struct TypeConfig {
    pub name: String,
    /// Storage collection. Defaults to the lowercased, pluralized name.
    #[serde(default)]
    pub collection: Option<String>,
    /// Strategy for contexts that do not set their own.
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
    #[serde(default)]
    pub contexts: Vec<ContextConfig>,
}

/// One `[[types.contexts]]` entry.
#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    pub name: String,
    #[serde(flatten)]
    pub options: ContextOptions,
}

impl TypeConfig {
    /// Strategy for a context: its own setting, else the type default.
    pub fn strategy_for(&self, context: &ContextConfig) -> Option<StrategyKind> {
        context.options.strategy.or(self.strategy)
    }
}

impl Config {
    pub fn find_type(&self, name: &str) -> Option<&TypeConfig> {
        self.types.iter().find(|t| t.name == name)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.types.is_empty() {
        anyhow::bail!("at least one [[types]] entry is required");
    }

    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be at least 1");
    }

    let mut seen = HashSet::new();
    for ty in &config.types {
        if ty.name.trim().is_empty() {
            anyhow::bail!("types.name must not be empty");
        }
        if !seen.insert(ty.name.as_str()) {
            anyhow::bail!("duplicate type name: '{}'", ty.name);
        }
        for ctx in &ty.contexts {
            if ctx.name.trim().is_empty() {
                anyhow::bail!("types.contexts.name must not be empty (type '{}')", ty.name);
            }
            if ctx.options.separator.as_deref() == Some("") {
                anyhow::bail!(
                    "types.contexts.separator must not be empty (context '{}.{}')",
                    ty.name,
                    ctx.name
                );
            }
            ctx.options
                .validate()
                .with_context(|| format!("invalid context '{}.{}'", ty.name, ctx.name))?;
        }
    }

    Ok(())
}
