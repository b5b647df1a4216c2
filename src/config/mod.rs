//! # Configuration Management Module
//!
//! Hearthkeep reads one TOML file that says where saves and content live, how
//! merchants price and restock, and how verbose logging is.
//!
//! ## Configuration Structure
//!
//! - [`StorageConfig`] - Save database location
//! - [`CatalogConfig`] - JSON content seeds (items, merchants, world)
//! - [`LoggingConfig`] - Log level and optional log file
//! - [`EconomyConfig`] - Restock default, fulfillment policy, journal size
//! - [`PricingConfig`] - Charisma pricing curve
//! - [`SnapshotConfig`] - Show window length
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hearthkeep::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("Saves: {}", config.saves_path().display());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = "./data"
//! saves_db = "saves"
//!
//! [economy]
//! default_restock_minutes = 10
//! fulfillment = "exact"
//!
//! [pricing]
//! charisma_base = 10
//! charisma_rate = 0.05
//! ```
//!
//! Every section except `[storage]` and `[logging]` may be omitted.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::game::booking::DEFAULT_EVENT_WINDOW_MINUTES;
use crate::game::catalog::DEFAULT_RESTOCK_MINUTES;
use crate::game::shop::{Fulfillment, DEFAULT_JOURNAL_CAPACITY};

pub use crate::game::pricing::PricingConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Sled directory for saves, relative to `data_dir` unless absolute.
    #[serde(default = "default_saves_db")]
    pub saves_db: String,
}

fn default_saves_db() -> String {
    "saves".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub items_file: String,
    pub merchants_file: String,
    /// Building hours and NPC schedules. Optional; without it no NPCs or buildings are reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_file: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            items_file: "data/seeds/items.json".to_string(),
            merchants_file: "data/seeds/merchants.json".to_string(),
            world_file: Some("data/seeds/world.json".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Used for merchants whose content sets no restock interval.
    #[serde(default = "default_restock_minutes")]
    pub default_restock_minutes: u32,
    #[serde(default)]
    pub fulfillment: Fulfillment,
    #[serde(default = "default_journal_capacity")]
    pub journal_capacity: usize,
}

fn default_restock_minutes() -> u32 {
    DEFAULT_RESTOCK_MINUTES
}

fn default_journal_capacity() -> usize {
    DEFAULT_JOURNAL_CAPACITY
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            default_restock_minutes: DEFAULT_RESTOCK_MINUTES,
            fulfillment: Fulfillment::Exact,
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Minutes after a show's start during which it can be performed.
    #[serde(default = "default_event_window")]
    pub event_window_minutes: u32,
}

fn default_event_window() -> u32 {
    DEFAULT_EVENT_WINDOW_MINUTES
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            event_window_minutes: DEFAULT_EVENT_WINDOW_MINUTES,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        if self.economy.default_restock_minutes == 0 {
            return Err(anyhow!("economy.default_restock_minutes must be at least 1"));
        }
        if self.economy.journal_capacity == 0 {
            return Err(anyhow!("economy.journal_capacity must be at least 1"));
        }
        let p = &self.pricing;
        if !(p.charisma_rate.is_finite() && p.charisma_rate >= 0.0) {
            return Err(anyhow!("pricing.charisma_rate must be a non-negative number"));
        }
        if !(p.min_factor > 0.0 && p.min_factor <= 1.0 && p.max_factor >= 1.0 && p.max_factor.is_finite()) {
            return Err(anyhow!(
                "pricing factors must satisfy 0 < min_factor <= 1 <= max_factor (got {} / {})",
                p.min_factor,
                p.max_factor
            ));
        }
        if self.snapshot.event_window_minutes >= crate::game::types::MINUTES_PER_DAY {
            return Err(anyhow!("snapshot.event_window_minutes must be shorter than a day"));
        }
        Ok(())
    }

    /// Resolved sled directory for saves.
    pub fn saves_path(&self) -> PathBuf {
        let db = PathBuf::from(&self.storage.saves_db);
        if db.is_absolute() {
            db
        } else {
            PathBuf::from(&self.storage.data_dir).join(db)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                saves_db: default_saves_db(),
            },
            catalog: CatalogConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("hearthkeep.log".to_string()),
            },
            economy: EconomyConfig::default(),
            pricing: PricingConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}
