//! Configuration for imgdex.
//!
//! Sources are merged in order, later ones winning:
//! 1. built-in defaults,
//! 2. `imgdex.toml` in the platform configuration directory,
//! 3. a file named on the command line (TOML, YAML or JSON),
//! 4. `IMGDEX_*` environment variables (`IMGDEX_CACHE_SIZE=4096`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APPLICATION: &str = "imgdex";
const DEFAULT_CONCURRENCY: usize = 8;
// Anything else under the prefix (say, a wrapper script's own settings) is
// not ours to reject.
const KEYS: [&str; 3] = ["database", "cache_size", "concurrency"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite database holding every persisted index.
    pub database: PathBuf,
    /// In-memory cache capacity per index. `None` uses each index's own hint.
    pub cache_size: Option<u64>,
    /// Files indexed at the same time during a scan.
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            cache_size: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APPLICATION)
}

fn default_database() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().join("index.db"))
        .unwrap_or_else(|| PathBuf::from("imgdex.db"))
}

impl Config {
    /// Every configuration source, merged but not yet extracted.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dirs) = project_dirs() {
            figment = figment.merge(Toml::file_exact(dirs.config_dir().join("imgdex.toml")));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file_exact(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
                Some("json") => figment.merge(Json::file_exact(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed("IMGDEX_").only(&KEYS)))
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(explicit)?)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Invalid)?;
        config.validate()?;
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            exn::bail!(ErrorKind::Validation("concurrency must be at least 1"));
        }
        if self.cache_size == Some(0) {
            exn::bail!(ErrorKind::Validation("cache_size must be at least 1"));
        }
        if self.database.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Validation("database path is empty"));
        }
        Ok(())
    }
}
