//! Read-only game content: item definitions and merchant configuration.
//!
//! The catalog is owned outside the live-state core. This module provides the
//! lookup trait the core consumes plus a static, JSON-seeded implementation so
//! admins can tune shops without recompiling.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::game::errors::GameError;

/// Restock interval used when a merchant doesn't configure one.
pub const DEFAULT_RESTOCK_MINUTES: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Base value in gold.
    pub value: u64,
    #[serde(default, rename = "type")]
    pub item_type: String,
    /// Largest stack a single slot may hold.
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
}

fn default_max_stack() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShopType {
    #[default]
    General,
    /// Only deals in what it stocks.
    Specialty,
}

/// One catalogued item a merchant carries, with its baseline stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockEntry {
    pub item_id: String,
    pub stock: u32,
    pub max_stock: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MerchantConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub shop_type: ShopType,
    #[serde(default = "default_true")]
    pub buys_items: bool,
    #[serde(default = "default_buy_multiplier")]
    pub buy_multiplier: f64,
    #[serde(default = "default_sell_multiplier")]
    pub sell_multiplier: f64,
    pub starting_gold: u64,
    #[serde(default)]
    pub max_gold: u64,
    /// "hourly", "daily", "weekly" or a number of real-time minutes.
    #[serde(default)]
    pub restock_interval: Option<String>,
    /// Carried from content files; restocks reset to baseline and never read these.
    #[serde(default)]
    pub gold_regen_rate: u64,
    #[serde(default)]
    pub gold_regen_interval: Option<String>,
    #[serde(default)]
    pub inventory: Vec<StockEntry>,
}

fn default_true() -> bool {
    true
}

fn default_buy_multiplier() -> f64 {
    1.2
}

fn default_sell_multiplier() -> f64 {
    0.5
}

impl MerchantConfig {
    pub fn stock_entry(&self, item_id: &str) -> Option<&StockEntry> {
        self.inventory.iter().find(|entry| entry.item_id == item_id)
    }

    pub fn catalogues(&self, item_id: &str) -> bool {
        self.stock_entry(item_id).is_some()
    }

    /// Configured restock interval in real minutes, or `default_minutes` when unset.
    pub fn restock_minutes(&self, default_minutes: u32) -> u32 {
        self.restock_interval
            .as_deref()
            .map(parse_interval_to_minutes)
            .unwrap_or(default_minutes)
    }
}

/// Convert a named or numeric interval to real-time minutes.
/// One game day passes in ten real minutes.
pub fn parse_interval_to_minutes(interval: &str) -> u32 {
    match interval.trim() {
        "hourly" => 1,
        "daily" => 10,
        "weekly" => 70,
        other => match other.parse::<u32>() {
            Ok(minutes) if minutes > 0 => minutes,
            _ => DEFAULT_RESTOCK_MINUTES,
        },
    }
}

/// Lookup interface for externally owned content.
pub trait Catalog: Send + Sync {
    fn item_by_id(&self, id: &str) -> Result<ItemRecord, GameError>;
    fn merchant_config_by_id(&self, id: &str) -> Result<MerchantConfig, GameError>;
}

/// In-memory catalog, usually seeded from JSON files.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: HashMap<String, ItemRecord>,
    merchants: HashMap<String, MerchantConfig>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: ItemRecord) -> Self {
        self.items.insert(item.id.clone(), item);
        self
    }

    pub fn with_merchant(mut self, merchant: MerchantConfig) -> Self {
        self.merchants.insert(merchant.id.clone(), merchant);
        self
    }

    /// Load items from a JSON array file and merchants from another.
    pub fn load_from_json<P: AsRef<Path>, Q: AsRef<Path>>(
        items_path: P,
        merchants_path: Q,
    ) -> Result<Self, GameError> {
        let items: Vec<ItemRecord> = read_json(items_path.as_ref())?;
        let merchants: Vec<MerchantConfig> = read_json(merchants_path.as_ref())?;
        let mut catalog = Self::new();
        for item in items {
            catalog = catalog.with_item(item);
        }
        for merchant in merchants {
            catalog = catalog.with_merchant(merchant);
        }
        log::info!(
            "Catalog loaded: {} items, {} merchants",
            catalog.items.len(),
            catalog.merchants.len()
        );
        Ok(catalog)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn merchant_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.merchants.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Catalog for StaticCatalog {
    fn item_by_id(&self, id: &str) -> Result<ItemRecord, GameError> {
        self.items
            .get(id)
            .cloned()
            .ok_or_else(|| GameError::NotFound(format!("item: {}", id)))
    }

    fn merchant_config_by_id(&self, id: &str) -> Result<MerchantConfig, GameError> {
        self.merchants
            .get(id)
            .cloned()
            .ok_or_else(|| GameError::NotFound(format!("merchant: {}", id)))
    }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, GameError> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| {
        log::error!("Failed to parse {}: {}", path.display(), e);
        GameError::from(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_intervals() {
        assert_eq!(parse_interval_to_minutes("hourly"), 1);
        assert_eq!(parse_interval_to_minutes("daily"), 10);
        assert_eq!(parse_interval_to_minutes("weekly"), 70);
        assert_eq!(parse_interval_to_minutes("45"), 45);
        assert_eq!(parse_interval_to_minutes("0"), DEFAULT_RESTOCK_MINUTES);
        assert_eq!(parse_interval_to_minutes("fortnightly"), DEFAULT_RESTOCK_MINUTES);
    }

    #[test]
    fn merchant_defaults_from_json() {
        let json = r#"{
            "id": "blacksmith",
            "name": "Brom the Smith",
            "starting_gold": 500,
            "inventory": [{ "item_id": "longsword", "stock": 3, "max_stock": 5 }]
        }"#;
        let merchant: MerchantConfig = serde_json::from_str(json).unwrap();
        assert_eq!(merchant.shop_type, ShopType::General);
        assert!(merchant.buys_items);
        assert_eq!(merchant.restock_minutes(DEFAULT_RESTOCK_MINUTES), DEFAULT_RESTOCK_MINUTES);
        assert!(merchant.catalogues("longsword"));
        assert!(!merchant.catalogues("dagger"));
    }

    #[test]
    fn unknown_lookups_are_not_found() {
        let catalog = StaticCatalog::new();
        assert!(matches!(
            catalog.item_by_id("ghost"),
            Err(GameError::NotFound(_))
        ));
        assert!(matches!(
            catalog.merchant_config_by_id("ghost"),
            Err(GameError::NotFound(_))
        ));
    }

    #[test]
    fn load_from_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let items = dir.path().join("items.json");
        let merchants = dir.path().join("merchants.json");
        fs::write(
            &items,
            r#"[{ "id": "arrow", "name": "Arrow", "value": 1, "max_stack": 50 }]"#,
        )
        .unwrap();
        fs::write(
            &merchants,
            r#"[{ "id": "fletcher", "name": "Fletcher", "shop_type": "specialty",
                  "starting_gold": 100, "restock_interval": "hourly",
                  "inventory": [{ "item_id": "arrow", "stock": 40, "max_stock": 60 }] }]"#,
        )
        .unwrap();

        let catalog = StaticCatalog::load_from_json(&items, &merchants).unwrap();
        assert_eq!(catalog.item_by_id("arrow").unwrap().max_stack, 50);
        let fletcher = catalog.merchant_config_by_id("fletcher").unwrap();
        assert_eq!(fletcher.shop_type, ShopType::Specialty);
        assert_eq!(fletcher.restock_minutes(DEFAULT_RESTOCK_MINUTES), 1);
    }

    #[test]
    fn malformed_seed_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let items = dir.path().join("items.json");
        fs::write(&items, r#"[{ "id": "arrow", "name": "#).unwrap();

        let err = StaticCatalog::load_from_json(&items, dir.path().join("merchants.json")).unwrap_err();
        assert!(matches!(err, GameError::Json(_)));
        assert_eq!(err.kind(), "invalid_content");

        let missing = StaticCatalog::load_from_json(dir.path().join("absent.json"), &items).unwrap_err();
        assert!(matches!(missing, GameError::Io(_)));
    }
}
