//! Top-level wiring: builds the session store, merchant economy and shop
//! engine from a [`Config`] and owns them for the life of the process.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::{info, warn};

use crate::config::Config;
use crate::game::catalog::StaticCatalog;
use crate::game::clock::{Clock, SystemClock};
use crate::game::merchant::MerchantEconomy;
use crate::game::session::SessionStore;
use crate::game::shop::ShopEngine;
use crate::game::storage::{SaveStore, SledSaveStore};
use crate::game::world::{StaticWorld, WorldView};
use crate::logutil::short_id;

pub struct LiveState {
    pub saves: Arc<dyn SaveStore>,
    pub catalog: Arc<StaticCatalog>,
    pub sessions: Arc<SessionStore>,
    pub economy: Arc<MerchantEconomy>,
    pub shop: ShopEngine,
}

impl LiveState {
    /// Open the sled save store and JSON seeds named by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let saves = SledSaveStore::open(config.saves_path())
            .map_err(|e| anyhow!("Failed to open save store {}: {}", config.saves_path().display(), e))?;
        let catalog = StaticCatalog::load_from_json(&config.catalog.items_file, &config.catalog.merchants_file)
            .map_err(|e| anyhow!("Failed to load catalog: {}", e))?;
        let world = match config.catalog.world_file.as_deref() {
            Some(path) if Path::new(path).exists() => {
                StaticWorld::load_from_json(path).map_err(|e| anyhow!("Failed to load world {}: {}", path, e))?
            }
            Some(path) => {
                warn!("World file {} not found; no NPCs or buildings will be reported", path);
                StaticWorld::default()
            }
            None => StaticWorld::default(),
        };
        Ok(Self::assemble(
            config,
            Arc::new(saves),
            Arc::new(catalog),
            Arc::new(world),
            Arc::new(SystemClock),
        ))
    }

    /// Build from already constructed collaborators.
    pub fn assemble(
        config: &Config,
        saves: Arc<dyn SaveStore>,
        catalog: Arc<StaticCatalog>,
        world: Arc<dyn WorldView>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = Arc::new(
            SessionStore::new(saves.clone(), world, clock.clone())
                .with_event_window(config.snapshot.event_window_minutes),
        );
        let economy = Arc::new(MerchantEconomy::new(clock));
        let shop = ShopEngine::new(sessions.clone(), economy.clone(), catalog.clone())
            .with_pricing(config.pricing)
            .with_fulfillment(config.economy.fulfillment)
            .with_default_restock_minutes(config.economy.default_restock_minutes)
            .with_journal_capacity(config.economy.journal_capacity);
        info!(
            "Live state ready: {} items, {} merchants",
            catalog.item_count(),
            catalog.merchant_ids().len()
        );
        Self {
            saves,
            catalog,
            sessions,
            economy,
            shop,
        }
    }

    /// Player left: drop the session and every merchant ledger they had.
    /// Unsaved changes are discarded; call `save_to_disk` first to keep them.
    pub fn logout(&self, player: &str, save_id: &str) {
        self.sessions.unload(player, save_id);
        let dropped = self.economy.cleanup_player(player);
        info!("Player {} logged out ({} merchant states dropped)", short_id(player), dropped);
    }
}
