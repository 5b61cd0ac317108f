// ABOUTME: TOML dump profiles loaded with --config
// ABOUTME: Profile values act as defaults that command-line flags override

use crate::dialect::Dialect;
use crate::dump::DumpOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A saved dump profile
///
/// ```toml
/// source = "sqlite://data/app.db"
/// target = "postgresql"
/// output = "app.sql"
///
/// [dump]
/// exclude_tables = ["sessions"]
/// chunk_size = 500
/// conflict_mode = "ignore"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DumpConfig {
    pub source: Option<String>,
    pub target: Option<Dialect>,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub dump: DumpOptions,
}

impl DumpConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: DumpConfig =
            toml::from_str(content).context("Failed to parse dump configuration")?;
        config.dump.validate()?;
        Ok(config)
    }
}

/// Read and parse a dump profile from disk
pub fn load_dump_config(path: impl AsRef<Path>) -> Result<DumpConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    DumpConfig::from_toml(&content)
        .with_context(|| format!("Invalid config file '{}'", path.display()))
}
