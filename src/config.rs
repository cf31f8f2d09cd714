//! TOML configuration parsing and validation.
//!
//! ```toml
//! [store]
//! backend = "sqlite"
//! path = "./data/harvest.sqlite"
//!
//! [crawl]
//! max_folder_depth = 64
//!
//! [accounts.work]
//! provider = "google"
//! capabilities = ["documents", "photos"]
//! snapshot_dir = "./feeds/work"
//!
//! [accounts.archive]
//! provider = "local"
//! root = "/srv/archive"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::provider::{Capability, ProviderKind};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Sparql,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// SPARQL query endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// SPARQL update endpoint; defaults to `endpoint`.
    #[serde(default)]
    pub update_endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Sqlite
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_max_folder_depth")]
    pub max_folder_depth: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_folder_depth: default_max_folder_depth(),
        }
    }
}

fn default_max_folder_depth() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    pub provider: ProviderKind,
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<Capability>,
    /// Directory holding exported provider listings (`google`, `windows_live`).
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
    /// Directory mirrored as a folder tree (`local`).
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_capabilities() -> Vec<Capability> {
    vec![Capability::Documents]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.store.backend {
        StoreBackend::Sqlite if config.store.path.is_none() => {
            bail!("store.path must be set when store.backend is 'sqlite'")
        }
        StoreBackend::Sparql if config.store.endpoint.is_none() => {
            bail!("store.endpoint must be set when store.backend is 'sparql'")
        }
        _ => {}
    }

    if config.crawl.max_folder_depth == 0 {
        bail!("crawl.max_folder_depth must be > 0");
    }

    for (name, account) in &config.accounts {
        if account.capabilities.is_empty() {
            bail!("accounts.{}.capabilities must not be empty", name);
        }
        match account.provider {
            ProviderKind::Google | ProviderKind::WindowsLive if account.snapshot_dir.is_none() => {
                bail!(
                    "accounts.{}.snapshot_dir must be set for provider '{}'",
                    name,
                    account.provider
                )
            }
            ProviderKind::Local if account.root.is_none() => {
                bail!("accounts.{}.root must be set for provider 'local'", name)
            }
            _ => {}
        }
        if account.capabilities.contains(&Capability::Photos)
            && account.provider != ProviderKind::Google
        {
            bail!(
                "accounts.{}: provider '{}' does not support the photos capability",
                name,
                account.provider
            );
        }
    }

    Ok(())
}
