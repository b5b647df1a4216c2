//! # Hearthkeep - live state for a session-based RPG
//!
//! Hearthkeep holds the authoritative in-memory state of every active player,
//! runs a per-player merchant economy that restocks on real-world timers,
//! executes atomic buy/sell transactions against it, and produces compact
//! deltas so clients can patch their view after every action.
//!
//! ## Features
//!
//! - **Session Store**: one live copy per (player, save), loaded from durable storage on demand
//! - **Merchant Economy**: lazily created per-player ledgers with hard-reset restocks
//! - **Shop Transactions**: session and merchant updated as one unit of work
//! - **Snapshot Deltas**: field-level diffs of location, vitals, inventory and show readiness
//! - **Injected Clock**: restock boundaries are testable without sleeping
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearthkeep::config::Config;
//! use hearthkeep::game::{ShopResponse, ShopTransactionRequest};
//! use hearthkeep::live::LiveState;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let live = LiveState::open(&config)?;
//!
//!     live.sessions.load("npub1alice", "slot1")?;
//!     let request = ShopTransactionRequest::buy("npub1alice", "slot1", "blacksmith", "longsword", 1);
//!     let response = ShopResponse::from_result(&live.shop.execute(&request));
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - Sessions, merchant economy, shop engine, snapshots and their collaborators
//! - [`live`] - Wires the services together from a [`config::Config`]
//! - [`config`] - Configuration management and validation
//! - [`logutil`] - Log-line helpers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Shop Engine    │ ← only code that moves gold and items
//! └─────────────────┘
//!      │        │
//! ┌─────────┐ ┌──────────────────┐
//! │ Session │ │ Merchant Economy │ ← per-key locks, session first
//! │ Store   │ └──────────────────┘
//! └─────────┘
//!      │
//! ┌─────────────────┐
//! │  Save Storage   │ ← sled, read on load, written only on request
//! └─────────────────┘
//! ```

pub mod config;
pub mod game;
pub mod live;
pub mod logutil;
