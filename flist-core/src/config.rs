//! src/config.rs
//! ============================================================================
//! # Config: Engine Configuration Loader and Saver
//!
//! User-editable defaults for sorting, filtering, trees, comparison, the
//! directory cache and logging. Stored as TOML in the platform config
//! directory found through [`directories`](https://docs.rs/directories).
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load().await?;
//! config.save().await?;
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use tokio::fs as TokioFs;

use crate::compare::engine::{CompareType, ListingMode};
use crate::error::FlistResult;
use crate::filter::engine::DotDirs;
use crate::logging::LoggerConfig;
use crate::sort::keys::{SignedKey, SortKey, SortKeys};

/// Default ordering of new panes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Signed sort keys, most significant first.
    pub keys: SortKeys,

    /// Comma-separated regexes used by the `groups` key.
    pub groups: String,

    /// Compare digit runs by numeric value.
    pub natural: bool,

    /// Name keys ignore case.
    pub ignore_case: bool,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            keys: SortKeys::default(),
            groups: String::new(),
            natural: true,
            ignore_case: false,
        }
    }
}

impl SortConfig {
    /// Keys new panes start with: `name` becomes `iname` under
    /// `ignore_case`, unless both are already configured.
    #[must_use]
    pub fn effective_keys(&self) -> SortKeys {
        if !self.ignore_case || self.keys.contains(SortKey::IName) {
            return self.keys;
        }

        let keys: Vec<SignedKey> = self
            .keys
            .iter()
            .map(|k: SignedKey| -> SignedKey {
                if k.key == SortKey::Name {
                    SignedKey { key: SortKey::IName, ..k }
                } else {
                    k
                }
            })
            .collect();
        SortKeys::from_keys(&keys).unwrap_or(self.keys)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub hide_dot_files: bool,

    /// The manual filter hides what it matches rather than what it doesn't.
    pub invert_manual: bool,

    pub dotdirs: DotDirs,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            hide_dot_files: true,
            invert_manual: true,
            dotdirs: DotDirs::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Levels walked eagerly; deeper directories are built folded.
    pub depth_limit: Option<usize>,

    /// Directories without visible children stay in the tree as leaves.
    pub show_empty_dirs: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth_limit: None,
            show_empty_dirs: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    pub compare_type: CompareType,
    pub listing: ListingMode,
    pub group_paths: bool,
    pub skip_empty: bool,
    pub ignore_case: bool,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            compare_type: CompareType::Contents,
            listing: ListingMode::All,
            group_paths: false,
            skip_empty: false,
            ignore_case: false,
        }
    }
}

/// Directory size / item-count cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcacheConfig {
    /// Maximum number of directories
    pub max_capacity: u64,

    /// Time-to-live for entries
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for DcacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 16_384,
            ttl: Duration::from_secs(1800), // 30 minutes
        }
    }
}

/// Main configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub sort: SortConfig,

    pub filter: FilterConfig,

    pub tree: TreeConfig,

    pub compare: CompareConfig,

    pub dcache: DcacheConfig,

    pub logging: LoggerConfig,
}

impl Config {
    /// Loads config from the platform config dir, writing defaults there
    /// when no file exists yet.
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            info!("Loading config from {}", path.display());
            let text = TokioFs::read_to_string(&path).await?;
            Ok(Self::from_toml_str(&text)?)
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save().await?;

            Ok(default_config)
        }
    }

    /// Saves config to the platform config dir.
    pub async fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;

        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(&path, toml_str).await?;

        Ok(())
    }

    /// Parses a TOML document; missing sections take their defaults.
    pub fn from_toml_str(text: &str) -> FlistResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Canonical config file path.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "flist", "flist")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Directory for session files.
    pub fn data_dir() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "flist", "flist")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory."))?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }
}
