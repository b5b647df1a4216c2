//! Per-player merchant economy with real-time restocks.
//!
//! Every (player, merchant) pair gets its own ledger of gold and stock,
//! created lazily on first visit. Restocks are a hard reset to the configured
//! baseline once the interval has elapsed on the injected clock; the
//! `gold_regen_*` content fields are never consulted.
//!
//! The registry is sharded: the map lock is only held to find or insert a
//! key's handle, and the restock check-and-apply runs under that key's own
//! mutex together with whatever the caller does next.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::game::catalog::{MerchantConfig, StockEntry};
use crate::game::clock::Clock;
use crate::game::sync;
use crate::logutil::short_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantStock {
    pub current_stock: u32,
    pub max_stock: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantState {
    pub merchant_id: String,
    pub current_gold: u64,
    pub inventory: HashMap<String, MerchantStock>,
    pub last_restock: DateTime<Utc>,
    pub restock_interval_minutes: u32,
}

/// What a merchant resets to on restock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantBaseline {
    pub starting_gold: u64,
    pub inventory: Vec<StockEntry>,
    pub restock_interval_minutes: u32,
}

impl MerchantBaseline {
    pub fn from_config(config: &MerchantConfig, default_restock_minutes: u32) -> Self {
        Self {
            starting_gold: config.starting_gold,
            inventory: config.inventory.clone(),
            restock_interval_minutes: config.restock_minutes(default_restock_minutes),
        }
    }
}

impl MerchantState {
    pub fn from_baseline(merchant_id: &str, baseline: &MerchantBaseline, now: DateTime<Utc>) -> Self {
        Self {
            merchant_id: merchant_id.to_string(),
            current_gold: baseline.starting_gold,
            inventory: baseline
                .inventory
                .iter()
                .map(|entry| {
                    (
                        entry.item_id.clone(),
                        MerchantStock {
                            current_stock: entry.stock,
                            max_stock: entry.max_stock,
                        },
                    )
                })
                .collect(),
            last_restock: now,
            restock_interval_minutes: baseline.restock_interval_minutes,
        }
    }

    pub fn stock_of(&self, item_id: &str) -> u32 {
        self.inventory
            .get(item_id)
            .map(|s| s.current_stock)
            .unwrap_or(0)
    }

    fn minutes_since_restock(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_restock).num_milliseconds() as f64 / 60_000.0
    }

    pub fn restock_due(&self, now: DateTime<Utc>) -> bool {
        self.minutes_since_restock(now) >= f64::from(self.restock_interval_minutes)
    }

    /// Minutes left until the next restock, never negative.
    pub fn minutes_until_restock(&self, now: DateTime<Utc>) -> f64 {
        (f64::from(self.restock_interval_minutes) - self.minutes_since_restock(now)).max(0.0)
    }

    /// Reset gold and stock to the baseline. Items already tracked refill to
    /// their max; items new to the baseline start at their configured stock.
    pub fn restock(&mut self, baseline: &MerchantBaseline, now: DateTime<Utc>) {
        self.current_gold = baseline.starting_gold;
        for entry in &baseline.inventory {
            self.inventory
                .entry(entry.item_id.clone())
                .and_modify(|stock| stock.current_stock = stock.max_stock)
                .or_insert(MerchantStock {
                    current_stock: entry.stock,
                    max_stock: entry.max_stock,
                });
        }
        self.last_restock = now;
    }

    /// Apply signed stock and gold deltas. Stock floors at zero and is not
    /// capped at max here; gold floors at zero.
    pub fn apply_delta(&mut self, item_id: &str, quantity_delta: i64, gold_delta: i64) {
        if let Some(stock) = self.inventory.get_mut(item_id) {
            let next = i128::from(stock.current_stock) + i128::from(quantity_delta);
            stock.current_stock = next.clamp(0, i128::from(u32::MAX)) as u32;
        }
        let gold = i128::from(self.current_gold) + i128::from(gold_delta);
        if gold < 0 {
            warn!(
                "Merchant {} gold would go negative ({}), holding at 0",
                self.merchant_id, gold
            );
        }
        self.current_gold = gold.clamp(0, i128::from(u64::MAX)) as u64;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MerchantKey {
    pub player: String,
    pub merchant_id: String,
}

impl MerchantKey {
    pub fn new(player: impl Into<String>, merchant_id: impl Into<String>) -> Self {
        Self {
            player: player.into(),
            merchant_id: merchant_id.into(),
        }
    }
}

type StateHandle = Arc<Mutex<MerchantState>>;

pub struct MerchantEconomy {
    states: std::sync::RwLock<HashMap<MerchantKey, StateHandle>>,
    clock: Arc<dyn Clock>,
}

impl MerchantEconomy {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        info!("Merchant economy initialized");
        Self {
            states: std::sync::RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn lookup(&self, key: &MerchantKey) -> Option<StateHandle> {
        sync::read(&self.states).get(key).cloned()
    }

    /// Existing handle for `key`, or a fresh one seeded from `baseline`.
    /// The flag is true when the state was created by this call.
    fn entry(&self, key: &MerchantKey, baseline: &MerchantBaseline) -> (StateHandle, bool) {
        if let Some(handle) = self.lookup(key) {
            return (handle, false);
        }
        let mut states = sync::write(&self.states);
        let mut created = false;
        let handle = states
            .entry(key.clone())
            .or_insert_with(|| {
                created = true;
                Arc::new(Mutex::new(MerchantState::from_baseline(
                    &key.merchant_id,
                    baseline,
                    self.clock.now(),
                )))
            })
            .clone();
        if created {
            info!(
                "Initializing merchant state: {} for player {}",
                key.merchant_id,
                short_id(&key.player)
            );
        }
        (handle, created)
    }

    /// Run `f` with exclusive access to the merchant's state after get-or-init
    /// and any due restock. `f` receives whether a restock just happened.
    pub fn with_state<R>(
        &self,
        player: &str,
        merchant_id: &str,
        baseline: &MerchantBaseline,
        f: impl FnOnce(&mut MerchantState, bool) -> R,
    ) -> R {
        let key = MerchantKey::new(player, merchant_id);
        let (handle, created) = self.entry(&key, baseline);
        let mut state = sync::lock(&handle);
        let now = self.clock.now();
        let mut restocked = false;
        if !created && state.restock_due(now) {
            info!(
                "Restocking merchant: {} for player {} ({:.0} min since last restock)",
                merchant_id,
                short_id(player),
                state.minutes_since_restock(now)
            );
            state.restock(baseline, now);
            restocked = true;
        }
        f(&mut state, restocked)
    }

    /// Copy of the merchant's state plus whether a restock just occurred.
    pub fn get_or_init_state(
        &self,
        player: &str,
        merchant_id: &str,
        baseline: &MerchantBaseline,
    ) -> (MerchantState, bool) {
        self.with_state(player, merchant_id, baseline, |state, restocked| {
            (state.clone(), restocked)
        })
    }

    /// Apply stock/gold deltas to a resident state. Missing state is a no-op.
    pub fn update_inventory(
        &self,
        player: &str,
        merchant_id: &str,
        item_id: &str,
        quantity_delta: i64,
        gold_delta: i64,
    ) {
        let Some(handle) = self.lookup(&MerchantKey::new(player, merchant_id)) else {
            debug!(
                "Merchant state not resident: {} for player {}",
                merchant_id,
                short_id(player)
            );
            return;
        };
        let mut state = sync::lock(&handle);
        state.apply_delta(item_id, quantity_delta, gold_delta);
        debug!(
            "Merchant updated: {} | item {} ({:+}) | gold {} ({:+})",
            merchant_id, item_id, quantity_delta, state.current_gold, gold_delta
        );
    }

    /// Minutes until the next restock; zero when nothing is resident.
    pub fn time_until_restock(&self, player: &str, merchant_id: &str) -> f64 {
        match self.lookup(&MerchantKey::new(player, merchant_id)) {
            Some(handle) => sync::lock(&handle).minutes_until_restock(self.clock.now()),
            None => 0.0,
        }
    }

    /// Drop every merchant state for a player (logout). Returns how many were removed.
    pub fn cleanup_player(&self, player: &str) -> usize {
        let mut states = sync::write(&self.states);
        let before = states.len();
        states.retain(|key, _| key.player != player);
        let removed = before - states.len();
        info!(
            "Cleaned up {} merchant states for player {}",
            removed,
            short_id(player)
        );
        removed
    }

    /// Snapshot of a player's merchant states keyed by merchant id.
    pub fn states_for_player(&self, player: &str) -> HashMap<String, MerchantState> {
        let handles: Vec<(String, StateHandle)> = sync::read(&self.states)
            .iter()
            .filter(|(key, _)| key.player == player)
            .map(|(key, handle)| (key.merchant_id.clone(), handle.clone()))
            .collect();
        handles
            .into_iter()
            .map(|(id, handle)| {
                let state = sync::lock(&handle).clone();
                (id, state)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::clock::ManualClock;

    fn baseline() -> MerchantBaseline {
        MerchantBaseline {
            starting_gold: 500,
            inventory: vec![StockEntry {
                item_id: "longsword".into(),
                stock: 3,
                max_stock: 5,
            }],
            restock_interval_minutes: 10,
        }
    }

    fn economy() -> (MerchantEconomy, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (MerchantEconomy::new(clock.clone()), clock)
    }

    #[test]
    fn first_visit_seeds_from_baseline_without_restock() {
        let (economy, _) = economy();
        let (state, restocked) = economy.get_or_init_state("npub1alice", "blacksmith", &baseline());
        assert!(!restocked);
        assert_eq!(state.current_gold, 500);
        assert_eq!(state.stock_of("longsword"), 3);
        assert_eq!(state.inventory["longsword"].max_stock, 5);
    }

    #[test]
    fn restock_waits_for_the_interval() {
        let (economy, clock) = economy();
        economy.get_or_init_state("p", "blacksmith", &baseline());
        economy.update_inventory("p", "blacksmith", "longsword", -2, 36);

        clock.advance_minutes(9);
        let (state, restocked) = economy.get_or_init_state("p", "blacksmith", &baseline());
        assert!(!restocked);
        assert_eq!(state.stock_of("longsword"), 1);
        assert_eq!(state.current_gold, 536);

        clock.advance_minutes(1);
        let (state, restocked) = economy.get_or_init_state("p", "blacksmith", &baseline());
        assert!(restocked);
        assert_eq!(state.stock_of("longsword"), 5);
        assert_eq!(state.current_gold, 500);

        let (_, again) = economy.get_or_init_state("p", "blacksmith", &baseline());
        assert!(!again);
    }

    #[test]
    fn restock_adds_newly_configured_items() {
        let (economy, clock) = economy();
        economy.get_or_init_state("p", "blacksmith", &baseline());
        let mut grown = baseline();
        grown.inventory.push(StockEntry {
            item_id: "shield".into(),
            stock: 1,
            max_stock: 2,
        });
        clock.advance_minutes(10);
        let (state, restocked) = economy.get_or_init_state("p", "blacksmith", &grown);
        assert!(restocked);
        assert_eq!(state.stock_of("shield"), 1);
    }

    #[test]
    fn update_floors_stock_and_gold() {
        let (economy, _) = economy();
        economy.get_or_init_state("p", "blacksmith", &baseline());
        economy.update_inventory("p", "blacksmith", "longsword", -10, -900);
        let (state, _) = economy.get_or_init_state("p", "blacksmith", &baseline());
        assert_eq!(state.stock_of("longsword"), 0);
        assert_eq!(state.current_gold, 0);

        // Above max is left for restock to fix.
        economy.update_inventory("p", "blacksmith", "longsword", 7, 0);
        let (state, _) = economy.get_or_init_state("p", "blacksmith", &baseline());
        assert_eq!(state.stock_of("longsword"), 7);
    }

    #[test]
    fn update_without_state_is_a_noop() {
        let (economy, _) = economy();
        economy.update_inventory("p", "ghost", "longsword", -1, 10);
        assert!(economy.states_for_player("p").is_empty());
    }

    #[test]
    fn time_until_restock_counts_down() {
        let (economy, clock) = economy();
        assert_eq!(economy.time_until_restock("p", "blacksmith"), 0.0);
        economy.get_or_init_state("p", "blacksmith", &baseline());
        clock.advance_minutes(4);
        assert!((economy.time_until_restock("p", "blacksmith") - 6.0).abs() < 1e-9);
        clock.advance_minutes(20);
        assert_eq!(economy.time_until_restock("p", "blacksmith"), 0.0);
    }

    #[test]
    fn cleanup_only_touches_one_player() {
        let (economy, _) = economy();
        economy.get_or_init_state("alice", "blacksmith", &baseline());
        economy.get_or_init_state("alice", "baker", &baseline());
        economy.get_or_init_state("bob", "blacksmith", &baseline());

        assert_eq!(economy.states_for_player("alice").len(), 2);
        assert_eq!(economy.cleanup_player("alice"), 2);
        assert!(economy.states_for_player("alice").is_empty());
        assert_eq!(economy.states_for_player("bob").len(), 1);
    }

    #[test]
    fn baseline_from_config_uses_default_interval() {
        let config: MerchantConfig = serde_json::from_str(
            r#"{ "id": "baker", "name": "Baker", "starting_gold": 40 }"#,
        )
        .unwrap();
        assert_eq!(MerchantBaseline::from_config(&config, 25).restock_interval_minutes, 25);
    }
}
