//! Shop transaction engine: the only code that moves gold and items between
//! a player and a merchant.
//!
//! A transaction is one unit of work. The engine locks the player's session,
//! then the merchant state (always in that order), computes the new payload on
//! a scratch copy, and commits both sides before either lock is released. A
//! failure anywhere before the commit leaves both sides untouched.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::catalog::{Catalog, ItemRecord, MerchantConfig, ShopType, DEFAULT_RESTOCK_MINUTES};
use crate::game::errors::GameError;
use crate::game::inventory::{add_item, credit_gold, deduct_gold, remove_item, total_gold};
use crate::game::merchant::{MerchantBaseline, MerchantEconomy};
use crate::game::pricing::PricingConfig;
use crate::game::session::{lock_session, SessionStore};
use crate::game::snapshot::Delta;
use crate::game::sync;
use crate::logutil::{escape_log, short_id};

/// Default number of committed transactions kept in memory.
pub const DEFAULT_JOURNAL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Buy,
    Sell,
}

/// What to do when a merchant has fewer items than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Fulfillment {
    /// Fail with `InsufficientStock`.
    #[default]
    Exact,
    /// Sell what is in stock.
    BestEffort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopTransactionRequest {
    pub player: String,
    pub save_id: String,
    pub merchant_id: String,
    pub item_id: String,
    pub quantity: u32,
    pub kind: TransactionKind,
    /// Overrides the engine default when set.
    #[serde(default)]
    pub fulfillment: Option<Fulfillment>,
}

impl ShopTransactionRequest {
    pub fn new(
        kind: TransactionKind,
        player: impl Into<String>,
        save_id: impl Into<String>,
        merchant_id: impl Into<String>,
        item_id: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            player: player.into(),
            save_id: save_id.into(),
            merchant_id: merchant_id.into(),
            item_id: item_id.into(),
            quantity,
            kind,
            fulfillment: None,
        }
    }

    pub fn buy(
        player: impl Into<String>,
        save_id: impl Into<String>,
        merchant_id: impl Into<String>,
        item_id: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self::new(TransactionKind::Buy, player, save_id, merchant_id, item_id, quantity)
    }

    pub fn sell(
        player: impl Into<String>,
        save_id: impl Into<String>,
        merchant_id: impl Into<String>,
        item_id: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self::new(TransactionKind::Sell, player, save_id, merchant_id, item_id, quantity)
    }

    pub fn with_fulfillment(mut self, fulfillment: Fulfillment) -> Self {
        self.fulfillment = Some(fulfillment);
        self
    }

    fn validate(&self) -> Result<(), GameError> {
        if self.quantity == 0 {
            return Err(GameError::InvalidRequest("quantity must be at least 1".to_string()));
        }
        for (field, value) in [
            ("player", &self.player),
            ("save_id", &self.save_id),
            ("merchant_id", &self.merchant_id),
            ("item_id", &self.item_id),
        ] {
            if value.trim().is_empty() {
                return Err(GameError::InvalidRequest(format!("{} is empty", field)));
            }
        }
        Ok(())
    }
}

/// Outcome of a committed transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShopReceipt {
    pub transaction_id: Uuid,
    pub kind: TransactionKind,
    pub merchant_id: String,
    pub item_id: String,
    pub requested: u32,
    /// Items actually moved.
    pub quantity: u32,
    pub unit_price: u64,
    /// Gold actually moved.
    pub total: u64,
    /// Player gold after the transaction.
    pub new_gold: u64,
    pub merchant_gold: u64,
    pub merchant_stock: u32,
    pub restocked: bool,
    pub message: String,
    #[serde(skip)]
    pub delta: Delta,
}

impl ShopReceipt {
    pub fn shortfall(&self) -> u32 {
        self.requested - self.quantity
    }
}

/// Transport shape handed back to request handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gold_spent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gold_earned: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_gold: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_bought: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_sold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ShopResponse {
    pub fn from_result(result: &Result<ShopReceipt, GameError>) -> Self {
        match result {
            Ok(receipt) => {
                let bought = receipt.kind == TransactionKind::Buy;
                Self {
                    success: true,
                    message: receipt.message.clone(),
                    gold_spent: bought.then_some(receipt.total),
                    gold_earned: (!bought).then_some(receipt.total),
                    new_gold: Some(receipt.new_gold),
                    items_bought: bought.then_some(receipt.quantity),
                    items_sold: (!bought).then_some(receipt.quantity),
                    error: None,
                }
            }
            Err(e) => Self {
                success: false,
                message: e.to_string(),
                gold_spent: None,
                gold_earned: None,
                new_gold: None,
                items_bought: None,
                items_sold: None,
                error: Some(e.kind().to_string()),
            },
        }
    }
}

/// Journal entry for a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub kind: TransactionKind,
    pub player: String,
    pub save_id: String,
    pub merchant_id: String,
    pub item_id: String,
    pub quantity: u32,
    pub gold: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShopItemView {
    pub item_id: String,
    pub name: String,
    pub buy_price: u64,
    pub sell_price: u64,
    pub current_stock: u32,
    pub max_stock: u32,
}

/// Everything a shop screen needs, priced for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShopView {
    pub merchant_id: String,
    pub name: String,
    pub shop_type: ShopType,
    pub buys_items: bool,
    pub current_gold: u64,
    pub max_gold: u64,
    pub items: Vec<ShopItemView>,
    pub minutes_until_restock: f64,
    pub just_restocked: bool,
}

pub struct ShopEngine {
    sessions: Arc<SessionStore>,
    economy: Arc<MerchantEconomy>,
    catalog: Arc<dyn Catalog>,
    pricing: PricingConfig,
    fulfillment: Fulfillment,
    default_restock_minutes: u32,
    journal: Mutex<VecDeque<TransactionRecord>>,
    journal_capacity: usize,
}

impl ShopEngine {
    pub fn new(sessions: Arc<SessionStore>, economy: Arc<MerchantEconomy>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            sessions,
            economy,
            catalog,
            pricing: PricingConfig::default(),
            fulfillment: Fulfillment::default(),
            default_restock_minutes: DEFAULT_RESTOCK_MINUTES,
            journal: Mutex::new(VecDeque::new()),
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
        }
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_fulfillment(mut self, fulfillment: Fulfillment) -> Self {
        self.fulfillment = fulfillment;
        self
    }

    pub fn with_default_restock_minutes(mut self, minutes: u32) -> Self {
        self.default_restock_minutes = minutes;
        self
    }

    pub fn with_journal_capacity(mut self, capacity: usize) -> Self {
        self.journal_capacity = capacity;
        self
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Run a buy or sell and log the outcome. Broken invariants are logged
    /// under the `economy` target at error level.
    pub fn execute(&self, request: &ShopTransactionRequest) -> Result<ShopReceipt, GameError> {
        let result = request.validate().and_then(|_| match request.kind {
            TransactionKind::Buy => self.buy(request),
            TransactionKind::Sell => self.sell(request),
        });
        match &result {
            Ok(receipt) => {
                info!(
                    "{} {:?} {}x {} at {}: {} gold",
                    short_id(&request.player),
                    receipt.kind,
                    receipt.quantity,
                    escape_log(&receipt.item_id),
                    escape_log(&receipt.merchant_id),
                    receipt.total
                );
                self.record(request, receipt);
            }
            Err(e) if e.is_invariant_violation() => {
                error!(
                    target: "economy",
                    "Invariant violated during {:?} by {} at {}: {}",
                    request.kind,
                    short_id(&request.player),
                    escape_log(&request.merchant_id),
                    e
                );
            }
            Err(e) => {
                info!(
                    "{:?} rejected for {} at {}: {}",
                    request.kind,
                    short_id(&request.player),
                    escape_log(&request.merchant_id),
                    e
                );
            }
        }
        result
    }

    fn merchant(&self, merchant_id: &str) -> Result<(MerchantConfig, MerchantBaseline), GameError> {
        let config = self.catalog.merchant_config_by_id(merchant_id)?;
        let baseline = MerchantBaseline::from_config(&config, self.default_restock_minutes);
        Ok((config, baseline))
    }

    fn buy(&self, request: &ShopTransactionRequest) -> Result<ShopReceipt, GameError> {
        let (config, baseline) = self.merchant(&request.merchant_id)?;
        if !config.catalogues(&request.item_id) {
            return Err(GameError::NotInStock {
                merchant: config.name.clone(),
                item: request.item_id.clone(),
            });
        }
        let item = self.catalog.item_by_id(&request.item_id)?;
        let fulfillment = request.fulfillment.unwrap_or(self.fulfillment);

        let handle = self.sessions.get(&request.player, &request.save_id)?;
        let mut session = lock_session(&handle);

        self.economy.with_state(
            &request.player,
            &request.merchant_id,
            &baseline,
            |state, restocked| {
                let available = state.stock_of(&item.id);
                let mut wanted = request.quantity;
                if available < wanted {
                    if fulfillment == Fulfillment::Exact || available == 0 {
                        return Err(GameError::InsufficientStock {
                            requested: wanted,
                            available,
                        });
                    }
                    wanted = available;
                }

                let unit_price =
                    self.pricing
                        .unit_buy_price(item.value, config.buy_multiplier, session.save().stats.charisma);
                let provisional = unit_price
                    .checked_mul(u64::from(wanted))
                    .ok_or_else(|| GameError::InvalidRequest("transaction total too large".to_string()))?;
                let have = total_gold(session.save());
                if have < provisional {
                    return Err(GameError::InsufficientFunds {
                        need: provisional,
                        have,
                    });
                }

                let mut scratch = session.save().clone();
                let placed = add_item(&mut scratch, &item, wanted)?;
                let cost = unit_price * u64::from(placed);
                if !deduct_gold(&mut scratch, cost) {
                    return Err(GameError::Internal(format!(
                        "could not deduct {} gold after checking {} was available",
                        cost, have
                    )));
                }
                let gold_delta = i64::try_from(cost)
                    .map_err(|_| GameError::InvalidRequest("transaction total too large".to_string()))?;
                let new_gold = total_gold(&scratch);

                let delta = self
                    .sessions
                    .apply(&mut session, scratch)
                    .map_err(|e| GameError::Internal(format!("buy produced an invalid save: {}", e)))?;
                state.apply_delta(&item.id, -i64::from(placed), gold_delta);

                Ok(ShopReceipt {
                    transaction_id: Uuid::new_v4(),
                    kind: TransactionKind::Buy,
                    merchant_id: request.merchant_id.clone(),
                    item_id: item.id.clone(),
                    requested: request.quantity,
                    quantity: placed,
                    unit_price,
                    total: cost,
                    new_gold,
                    merchant_gold: state.current_gold,
                    merchant_stock: state.stock_of(&item.id),
                    restocked,
                    message: buy_message(&item, request.quantity, available, placed, cost, restocked),
                    delta,
                })
            },
        )
    }

    /// Credit the player for items already staged out of their inventory.
    /// See [`ShopEngine::stage_sale`].
    fn sell(&self, request: &ShopTransactionRequest) -> Result<ShopReceipt, GameError> {
        let (config, baseline) = self.merchant(&request.merchant_id)?;
        if !config.buys_items {
            return Err(GameError::PolicyRejected(format!("{} doesn't buy items", config.name)));
        }
        if config.shop_type == ShopType::Specialty && !config.catalogues(&request.item_id) {
            return Err(GameError::PolicyRejected(format!(
                "{} only buys what they sell",
                config.name
            )));
        }
        let item = self.catalog.item_by_id(&request.item_id)?;

        let handle = self.sessions.get(&request.player, &request.save_id)?;
        let mut session = lock_session(&handle);

        self.economy.with_state(
            &request.player,
            &request.merchant_id,
            &baseline,
            |state, restocked| {
                let unit_price = self.pricing.unit_sell_price(
                    item.value,
                    config.sell_multiplier,
                    session.save().stats.charisma,
                );
                let value = unit_price
                    .checked_mul(u64::from(request.quantity))
                    .ok_or_else(|| GameError::InvalidRequest("transaction total too large".to_string()))?;
                if state.current_gold < value {
                    return Err(GameError::InsufficientMerchantFunds {
                        need: value,
                        have: state.current_gold,
                    });
                }
                let gold_delta = i64::try_from(value)
                    .map_err(|_| GameError::InvalidRequest("transaction total too large".to_string()))?;

                let mut scratch = session.save().clone();
                credit_gold(&mut scratch.inventory, value)?;
                let new_gold = total_gold(&scratch);

                let delta = self
                    .sessions
                    .apply(&mut session, scratch)
                    .map_err(|e| GameError::Internal(format!("sale produced an invalid save: {}", e)))?;
                state.apply_delta(&item.id, i64::from(request.quantity), -gold_delta);

                let mut message = format!(
                    "Sold {} {} for {} gold.",
                    request.quantity, item.name, value
                );
                if restocked {
                    message.insert_str(0, "The merchant has restocked. ");
                }
                Ok(ShopReceipt {
                    transaction_id: Uuid::new_v4(),
                    kind: TransactionKind::Sell,
                    merchant_id: request.merchant_id.clone(),
                    item_id: item.id.clone(),
                    requested: request.quantity,
                    quantity: request.quantity,
                    unit_price,
                    total: value,
                    new_gold,
                    merchant_gold: state.current_gold,
                    merchant_stock: state.stock_of(&item.id),
                    restocked,
                    message,
                    delta,
                })
            },
        )
    }

    /// Take items out of the player's inventory ahead of a sale. Selling
    /// itself never touches the player's items; a failed sale after staging
    /// leaves them removed until the session is reloaded or they are re-added.
    pub fn stage_sale(&self, player: &str, save_id: &str, item_id: &str, quantity: u32) -> Result<Delta, GameError> {
        let handle = self.sessions.get(player, save_id)?;
        let mut session = lock_session(&handle);
        let mut scratch = session.save().clone();
        remove_item(&mut scratch, item_id, quantity)?;
        self.sessions.apply(&mut session, scratch)
    }

    /// Merchant inventory priced at the player's charisma. Visiting the shop
    /// initialises or restocks the merchant like a transaction would.
    pub fn shop_view(&self, player: &str, save_id: &str, merchant_id: &str) -> Result<ShopView, GameError> {
        let (config, baseline) = self.merchant(merchant_id)?;
        let charisma = {
            let handle = self.sessions.get(player, save_id)?;
            let session = lock_session(&handle);
            session.save().stats.charisma
        };

        let mut priced = Vec::with_capacity(config.inventory.len());
        for entry in &config.inventory {
            match self.catalog.item_by_id(&entry.item_id) {
                Ok(item) => priced.push(item),
                Err(_) => warn!(
                    "Merchant {} lists unknown item {}",
                    escape_log(merchant_id),
                    escape_log(&entry.item_id)
                ),
            }
        }

        Ok(self.economy.with_state(player, merchant_id, &baseline, |state, restocked| {
            let now = self.sessions.clock().now();
            ShopView {
                merchant_id: config.id.clone(),
                name: config.name.clone(),
                shop_type: config.shop_type,
                buys_items: config.buys_items,
                current_gold: state.current_gold,
                max_gold: config.max_gold.max(config.starting_gold),
                items: priced
                    .iter()
                    .map(|item| {
                        let stock = state.inventory.get(&item.id);
                        ShopItemView {
                            item_id: item.id.clone(),
                            name: item.name.clone(),
                            buy_price: self.pricing.unit_buy_price(item.value, config.buy_multiplier, charisma),
                            sell_price: self.pricing.unit_sell_price(item.value, config.sell_multiplier, charisma),
                            current_stock: stock.map(|s| s.current_stock).unwrap_or(0),
                            max_stock: stock.map(|s| s.max_stock).unwrap_or(0),
                        }
                    })
                    .collect(),
                minutes_until_restock: state.minutes_until_restock(now),
                just_restocked: restocked,
            }
        }))
    }

    fn record(&self, request: &ShopTransactionRequest, receipt: &ShopReceipt) {
        let mut journal = sync::lock(&self.journal);
        journal.push_back(TransactionRecord {
            id: receipt.transaction_id,
            at: self.sessions.clock().now(),
            kind: receipt.kind,
            player: request.player.clone(),
            save_id: request.save_id.clone(),
            merchant_id: receipt.merchant_id.clone(),
            item_id: receipt.item_id.clone(),
            quantity: receipt.quantity,
            gold: receipt.total,
        });
        while journal.len() > self.journal_capacity {
            journal.pop_front();
        }
    }

    /// Recent committed transactions, oldest first.
    pub fn journal(&self) -> Vec<TransactionRecord> {
        sync::lock(&self.journal).iter().cloned().collect()
    }
}

fn buy_message(item: &ItemRecord, requested: u32, available: u32, placed: u32, cost: u64, restocked: bool) -> String {
    let mut message = String::new();
    if restocked {
        message.push_str("The merchant has restocked. ");
    }
    message.push_str(&format!("Bought {} {} for {} gold.", placed, item.name, cost));
    if placed < requested {
        if available < requested && placed == available {
            message.push_str(&format!(" Only {} of {} were in stock.", placed, requested));
        } else {
            message.push_str(&format!(
                " Only {} of {} fit in your inventory; you were charged for {}.",
                placed, requested, placed
            ));
        }
    }
    message
}
