mod edit;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::update::{DEFAULT_MAX_ROUNDS, ProviderKey, Root};

pub use edit::cmd_config;

/// Top-level configuration loaded from `config.toml`.
///
/// Example TOML:
/// ```toml
/// max_rounds = 32
///
/// [[roots]]
/// path = "~/src/app"
///
/// [[roots]]
/// path = "~/src/legacy"
/// provider = "svn"
///
/// [providers.svn]
/// command = ["svn", "update", "--non-interactive"]
/// detect  = ".svn"
/// ```
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default)]
    pub roots: Vec<RootEntry>,
    #[serde(default)]
    pub providers: BTreeMap<String, CommandProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            roots: Vec::new(),
            providers: BTreeMap::new(),
        }
    }
}

fn default_max_rounds() -> u32 {
    DEFAULT_MAX_ROUNDS
}

/// One `[[roots]]` entry.
#[derive(Debug, Deserialize, Clone)]
pub struct RootEntry {
    pub path: String,
    #[serde(default)]
    pub provider: Option<String>,
}

impl RootEntry {
    /// `path` with a leading `~` expanded to `$HOME`.
    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.path)
    }

    pub fn to_root(&self) -> Root {
        let path = self.resolved_path();
        match &self.provider {
            Some(p) => Root::with_provider(path, ProviderKey::new(p.as_str())),
            None => Root::new(path),
        }
    }
}

/// A `[providers.<name>]` table describing an external update command.
#[derive(Debug, Deserialize, Clone)]
pub struct CommandProviderConfig {
    /// Program and arguments; `{step}` is replaced by the current chained step.
    pub command: Vec<String>,
    /// Steps run one per round, in order.
    #[serde(default)]
    pub steps: Vec<String>,
    /// Marker entry (e.g. `.svn`) that makes a root detected as this provider.
    #[serde(default)]
    pub detect: Option<String>,
}

impl Config {
    /// Roots to update: every configured root, or `requested` paths resolved
    /// against the configured ones so their provider setting carries over.
    pub fn select_roots(&self, requested: &[PathBuf]) -> Vec<Root> {
        let configured: Vec<Root> = self.roots.iter().map(RootEntry::to_root).collect();
        if requested.is_empty() {
            return configured;
        }
        requested
            .iter()
            .map(|path| {
                let wanted = normalize(path);
                configured
                    .iter()
                    .find(|r| normalize(&r.path) == wanted)
                    .cloned()
                    .unwrap_or_else(|| Root::new(wanted))
            })
            .collect()
    }
}

/// Parse configuration text.
pub fn parse_config(txt: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(txt).context("failed to parse config.toml")?;
    Ok(cfg)
}

/// Load and parse the configuration file at `path`.
///
/// # Errors
/// - Returns an error if the file cannot be read; the message includes the path.
/// - Returns an error if parsing the TOML fails.
pub fn load_config(path: &Path) -> Result<Config> {
    let txt = fs::read_to_string(path)
        .with_context(|| format!("config not found: {}", path.display()))?;
    parse_config(&txt)
}

fn expand_home(p: &str) -> PathBuf {
    if let Some(rest) = p.strip_prefix("~/") {
        if let Some(home) = env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    } else if p == "~"
        && let Some(home) = env::var_os("HOME")
    {
        return PathBuf::from(home);
    }
    PathBuf::from(p)
}

fn normalize(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf())
}
