//! # Engine Configuration
//!
//! Configuration management for the engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BODEGA_ORG_ID=org-123                                              │
//! │     BODEGA_HISTORY_CAPACITY=50                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/bodega/bodega.toml (Linux)                               │
//! │     ~/Library/Application Support/com.bodega.engine/bodega.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     50 reports per history log, feed channel of 100                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # bodega.toml
//! [organization]
//! id = "3f0c5d2e-org"
//! name = "Bodega La Esquina"
//!
//! [history]
//! capacity = 50
//!
//! [feed]
//! channel_capacity = 100
//!
//! [cache]
//! enabled = true
//! path = "/var/lib/bodega/cache.json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use bodega_core::history::DEFAULT_HISTORY_CAPACITY;

use crate::error::{EngineError, EngineResult};

const CONFIG_FILE: &str = "bodega.toml";
const CACHE_FILE: &str = "cache.json";

// =============================================================================
// Organization
// =============================================================================

/// The tenant every backend call is scoped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub id: String,

    #[serde(default)]
    pub name: String,
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        OrganizationConfig {
            id: "default-org".to_string(),
            name: "Default Organization".to_string(),
        }
    }
}

// =============================================================================
// History, Feed, Cache
// =============================================================================

/// Movement history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Reports kept per log; older ones are dropped.
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl Default for HistorySettings {
    fn default() -> Self {
        HistorySettings {
            capacity: default_history_capacity(),
        }
    }
}

/// Change feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Events buffered before the feed producer waits.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    100
}

impl Default for FeedSettings {
    fn default() -> Self {
        FeedSettings {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Offline cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache file location. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            enabled: true,
            path: None,
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub organization: OrganizationConfig,

    #[serde(default)]
    pub history: HistorySettings,

    #[serde(default)]
    pub feed: FeedSettings,

    #[serde(default)]
    pub cache: CacheSettings,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config for one organization.
    pub fn for_organization(id: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.organization.id = id.into();
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (bodega.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.organization.id.trim().is_empty() {
            return Err(EngineError::MissingOrganization);
        }

        if self.history.capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "history capacity must be greater than 0".into(),
            ));
        }

        if self.feed.channel_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "feed channel_capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("BODEGA_ORG_ID") {
            debug!(organization_id = %id, "Overriding organization ID from environment");
            self.organization.id = id;
        }

        if let Some(name) = lookup("BODEGA_ORG_NAME") {
            self.organization.name = name;
        }

        if let Some(capacity) = lookup("BODEGA_HISTORY_CAPACITY") {
            match capacity.parse::<usize>() {
                Ok(c) => self.history.capacity = c,
                Err(_) => warn!(value = %capacity, "Ignoring invalid BODEGA_HISTORY_CAPACITY"),
            }
        }

        if let Some(capacity) = lookup("BODEGA_FEED_CAPACITY") {
            match capacity.parse::<usize>() {
                Ok(c) => self.feed.channel_capacity = c,
                Err(_) => warn!(value = %capacity, "Ignoring invalid BODEGA_FEED_CAPACITY"),
            }
        }

        if let Some(path) = lookup("BODEGA_CACHE_PATH") {
            debug!(path = %path, "Overriding cache path from environment");
            self.cache.path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bodega", "engine")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn organization_id(&self) -> &str {
        &self.organization.id
    }

    /// Resolved cache file, or `None` when caching is off.
    pub fn cache_path(&self) -> Option<PathBuf> {
        if !self.cache.enabled {
            return None;
        }
        self.cache.path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "bodega", "engine")
                .map(|dirs| dirs.data_dir().join(CACHE_FILE))
        })
    }
}
