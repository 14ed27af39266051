//! # Engine Configuration
//!
//! Configuration management for the inventory engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LARDER_DB_PATH=/var/lib/larder/larder.db                           │
//! │     LARDER_SELECTION_POLICY=fifo                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/larder/larder.toml (Linux)                               │
//! │     ~/Library/Application Support/com.larder.inventory/larder.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     scope COUNTER, SHELF → WEB, threshold 50, earliest-expiry-first    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # larder.toml
//! [database]
//! path = "/var/lib/larder/larder.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [checkout]
//! scope = "COUNTER"
//! primary_location = "SHELF"
//! fallback_location = "WEB"
//! low_stock_threshold = 50
//!
//! [selection]
//! policy = "earliest_expiry_first"  # earliest_expiry_first | fifo
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{InventoryError, InventoryResult};
use larder_core::validation::validate_scope;
use larder_core::{SelectionPolicy, StockLocation, DEFAULT_LOW_STOCK_THRESHOLD, DEFAULT_SCOPE};
use larder_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `:memory:` selects a private in-memory database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long a writer waits for the SQLite lock (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "larder", "inventory")
        .map(|dirs| dirs.data_dir().join("larder.db"))
        .unwrap_or_else(|| PathBuf::from("larder.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_busy_timeout() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            busy_timeout_ms: default_busy_timeout(),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Checkout Settings
// =============================================================================

/// Checkout behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Sequence scope for bill serials.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Location a checkout normally sells from.
    #[serde(default = "default_primary")]
    pub primary_location: StockLocation,

    /// Location that covers primary shortfalls.
    #[serde(default = "default_fallback")]
    pub fallback_location: StockLocation,

    /// Primary-location quantity below which a low-stock event is published.
    #[serde(default = "default_threshold")]
    pub low_stock_threshold: i64,
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_primary() -> StockLocation {
    StockLocation::Shelf
}

fn default_fallback() -> StockLocation {
    StockLocation::Web
}

fn default_threshold() -> i64 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            scope: default_scope(),
            primary_location: default_primary(),
            fallback_location: default_fallback(),
            low_stock_threshold: default_threshold(),
        }
    }
}

// =============================================================================
// Selection Settings
// =============================================================================

/// Batch selection settings, shared by checkout and transfer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionSettings {
    #[serde(default)]
    pub policy: SelectionPolicy,
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub selection: SelectionSettings,
}

impl EngineConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with a private in-memory database. Used by tests and demos.
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.database.path = PathBuf::from(":memory:");
        config.database.max_connections = 1;
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (larder.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> InventoryResult<Self> {
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

        config.apply_overrides(|key| std::env::var(key).ok());

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
    pub fn save(&self, config_path: Option<PathBuf>) -> InventoryResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| InventoryError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| InventoryError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| InventoryError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> InventoryResult<()> {
        validate_scope(&self.checkout.scope)
            .map_err(|e| InventoryError::InvalidConfig(e.to_string()))?;

        if self.checkout.primary_location == self.checkout.fallback_location {
            return Err(InventoryError::InvalidConfig(format!(
                "primary and fallback location are both {}",
                self.checkout.primary_location
            )));
        }

        if self.checkout.low_stock_threshold < 0 {
            return Err(InventoryError::InvalidConfig(
                "low_stock_threshold must not be negative".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(InventoryError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(InventoryError::InvalidConfig(
                "min_connections must not exceed max_connections".into(),
            ));
        }

        Ok(())
    }

    /// Applies `LARDER_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("LARDER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(scope) = lookup("LARDER_SCOPE") {
            self.checkout.scope = scope;
        }

        if let Some(policy) = lookup("LARDER_SELECTION_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding selection policy from environment");
                    self.selection.policy = parsed;
                }
                Err(_) => warn!(policy = %policy, "Unknown selection policy in environment"),
            }
        }

        if let Some(threshold) = lookup("LARDER_LOW_STOCK_THRESHOLD") {
            match threshold.parse::<i64>() {
                Ok(t) => self.checkout.low_stock_threshold = t,
                Err(_) => warn!(threshold = %threshold, "Invalid low-stock threshold in environment"),
            }
        }

        if let Some(max) = lookup("LARDER_MAX_CONNECTIONS") {
            if let Ok(m) = max.parse::<u32>() {
                self.database.max_connections = m;
            }
        }

        if let Some(ms) = lookup("LARDER_BUSY_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.database.busy_timeout_ms = ms;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "larder", "inventory")
            .map(|dirs| dirs.config_dir().join("larder.toml"))
    }

    /// Storage configuration for `larder_db::Database::new`.
    pub fn db_config(&self) -> DbConfig {
        let base = if self.database.path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database.path)
                .max_connections(self.database.max_connections)
                .min_connections(self.database.min_connections)
        };

        base.busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .run_migrations(self.database.run_migrations)
    }
}
