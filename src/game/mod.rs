//! Live game state: sessions, merchant economy, shop transactions and
//! snapshot deltas, plus the content and storage seams they depend on.

pub mod booking;
pub mod catalog;
pub mod clock;
pub mod errors;
pub mod inventory;
pub mod merchant;
pub mod pricing;
pub mod session;
pub mod shop;
pub mod snapshot;
pub mod storage;
mod sync;
pub mod types;
pub mod world;

pub use booking::{BookingStatus, PenaltyEffects, ShowBooking};
pub use catalog::{Catalog, ItemRecord, MerchantConfig, ShopType, StaticCatalog, StockEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::GameError;
pub use merchant::{MerchantBaseline, MerchantEconomy, MerchantState, MerchantStock};
pub use pricing::PricingConfig;
pub use session::{lock_session, GameSession, SessionHandle, SessionKey, SessionStore};
pub use shop::{
    Fulfillment, ShopEngine, ShopReceipt, ShopResponse, ShopTransactionRequest, ShopView,
    TransactionKind, TransactionRecord,
};
pub use snapshot::{diff, Delta, Snapshot};
pub use storage::{MemorySaveStore, SaveStore, SledSaveStore, SledSaveStoreBuilder};
pub use types::{Inventory, ItemStack, SaveData, Slot, Stats};
pub use world::{StaticWorld, WorldView};
