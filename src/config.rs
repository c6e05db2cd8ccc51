/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load and validate the operator configuration that drives
    mirror verification and catalog reconciliation.

  Security / Safety Notes:
    Configuration is read-only; no values are written back.
    Paths are resolved relative to XDG base directories.

  Dependencies:
    serde + toml for parsing, dirs for XDG resolution.

  Operational Scope:
    Consumed once per invocation and handed to the pipelines
    through the update context.

  Revision History:
    2026-09-14 COD  Introduced Syn-Repo configuration layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit defaults for every tunable
    - Validation before any network activity
============================================================*/

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SynrepoError};

const APP_DIR: &str = "syn-repo";
const CONFIG_FILE: &str = "config.toml";

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SynrepoConfig {
    pub mirror: MirrorConfig,
    pub catalog: CatalogConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
}

/// `[mirror]` section: topology sources and probing limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// pacman.conf style repository list (path or URL).
    pub repo_list: String,
    /// Mirror list (path or URL).
    pub mirror_list: String,
    /// Mirror treated as ground truth for sync verdicts.
    pub reference_mirror: String,
    /// Seconds allowed for a liveness probe.
    pub probe_timeout: u64,
    /// Seconds allowed for one repository index download.
    pub fetch_timeout: u64,
    pub max_parallel_requests: usize,
    pub user_agent: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            repo_list: "/etc/pacman.conf".into(),
            mirror_list: "/etc/pacman.d/mirrorlist".into(),
            reference_mirror: "http://kaosx.tk/repo/".into(),
            probe_timeout: 20,
            fetch_timeout: 60,
            max_parallel_requests: 8,
            user_agent: "Syn-Repo-Core/0.3 (linux)".into(),
        }
    }
}

/// `[catalog]` section: where repository archives live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_dir: String,
    pub extension: String,
    /// Explicit repository names; empty means discover from `base_dir`.
    pub repositories: Vec<String>,
    pub exclude: Vec<String>,
    pub max_parallel_scans: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_dir: "/var/www/html/repo".into(),
            extension: "files.tar.gz".into(),
            repositories: Vec::new(),
            exclude: vec!["ISO".into(), "kde-next".into()],
            max_parallel_scans: 4,
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: Option<PathBuf>,
}

/// `[log]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub directory: Option<PathBuf>,
}

impl SynrepoConfig {
    /// Load configuration from an explicit path, or from the default XDG
    /// location when present. An explicit path that cannot be read is an error;
    /// a missing default file yields the built-in defaults.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(explicit) => Self::load_from_path(explicit)?,
            None => match default_config_path() {
                Some(candidate) if candidate.is_file() => Self::load_from_path(&candidate)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SynrepoError::Config(format!(
                "Failed to read configuration {}: {err}",
                path.display()
            ))
        })?;
        Self::from_toml(&raw)
    }

    /// Parse a TOML document into a configuration.
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|err| SynrepoError::Config(format!("Invalid configuration: {err}")))
    }

    /// Reject values that would make the pipelines unusable.
    pub fn validate(&self) -> Result<()> {
        if self.mirror.max_parallel_requests == 0 {
            return Err(SynrepoError::Config(
                "mirror.max_parallel_requests must be at least 1".into(),
            ));
        }
        if self.catalog.max_parallel_scans == 0 {
            return Err(SynrepoError::Config(
                "catalog.max_parallel_scans must be at least 1".into(),
            ));
        }
        if self.mirror.probe_timeout == 0 || self.mirror.fetch_timeout == 0 {
            return Err(SynrepoError::Config(
                "mirror timeouts must be greater than zero".into(),
            ));
        }
        if self.mirror.reference_mirror.trim().is_empty() {
            return Err(SynrepoError::Config(
                "mirror.reference_mirror must name a mirror".into(),
            ));
        }
        if self.catalog.extension.trim().is_empty() {
            return Err(SynrepoError::Config("catalog.extension is empty".into()));
        }
        Ok(())
    }

    /// SQLite database backing the persistence gateway.
    pub fn database_path(&self) -> PathBuf {
        self.store.database.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("syn-repo.db")
        })
    }

    /// Directory receiving session logs.
    pub fn log_dir(&self) -> PathBuf {
        self.log.directory.clone().unwrap_or_else(|| {
            dirs::state_dir()
                .or_else(dirs::data_local_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("logs")
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}
