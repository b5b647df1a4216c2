//! Binary entrypoint for the Hearthkeep CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `import-save --player <id> --save <id> <file.json>` - validate and store a save
//! - `status` - list stored saves and loaded content
//! - `shop --player <id> --save <id> --merchant <id>` - show a merchant's prices
//! - `buy` / `sell` - run one transaction and print the response and delta
//!
//! Merchant ledgers live in memory only, so every invocation sees freshly
//! seeded merchants. See the library crate docs for module-level details.
use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use hearthkeep::config::Config;
use hearthkeep::game::{
    SaveData, SaveStore, ShopResponse, ShopTransactionRequest, SledSaveStore, TransactionKind,
};
use hearthkeep::live::LiveState;

#[derive(Parser)]
#[command(name = "hearthkeep")]
#[command(about = "Live session state and merchant economy for a session-based RPG")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args)]
struct SessionArgs {
    /// Player identity
    #[arg(long)]
    player: String,
    /// Save identifier
    #[arg(long)]
    save: String,
}

#[derive(Args)]
struct TradeArgs {
    #[command(flatten)]
    session: SessionArgs,
    #[arg(long)]
    merchant: String,
    #[arg(long)]
    item: String,
    #[arg(short, long, default_value_t = 1)]
    quantity: u32,
    /// Write the session back to the save store on success
    #[arg(long)]
    persist: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Import a JSON save file into the save store
    ImportSave {
        #[command(flatten)]
        session: SessionArgs,
        /// Path to the JSON save
        file: String,
    },
    /// Show stored saves and loaded content
    Status,
    /// Show a merchant's stock priced for a player
    Shop {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long)]
        merchant: String,
    },
    /// Buy from a merchant
    Buy(TradeArgs),
    /// Sell to a merchant (items are taken from the player's inventory first)
    Sell(TradeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            info!("Initializing new Hearthkeep configuration");
            Config::create_default(&cli.config).await?;
            let cfg = Config::default();
            tokio::fs::create_dir_all(&cfg.storage.data_dir).await?;
            info!("Configuration file created at {}", cli.config);
            println!("Wrote {}. Point [catalog] at your item/merchant seeds before trading.", cli.config);
        }
        Commands::ImportSave { session, file } => {
            let config = require_config(pre_config, &cli.config).await?;
            let text = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| anyhow!("Failed to read save file {}: {}", file, e))?;
            let save: SaveData =
                serde_json::from_str(&text).map_err(|e| anyhow!("Failed to parse save file {}: {}", file, e))?;
            let store = SledSaveStore::open(config.saves_path())?;
            store.write_save(&session.player, &session.save, &save)?;
            println!("Imported {} as {}/{}", file, session.player, session.save);
        }
        Commands::Status => {
            let config = require_config(pre_config, &cli.config).await?;
            let store = SledSaveStore::open(config.saves_path())?;
            let mut saves = store.list_saves()?;
            saves.sort();
            println!("Hearthkeep v{}", env!("CARGO_PKG_VERSION"));
            println!("Save store: {}", config.saves_path().display());
            println!("Stored saves: {}", saves.len());
            for (player, save_id) in saves {
                println!("  {} / {}", player, save_id);
            }
            match hearthkeep::game::StaticCatalog::load_from_json(
                &config.catalog.items_file,
                &config.catalog.merchants_file,
            ) {
                Ok(catalog) => println!(
                    "Catalog: {} items, merchants: {}",
                    catalog.item_count(),
                    catalog.merchant_ids().join(", ")
                ),
                Err(e) => println!("Catalog unavailable: {}", e),
            }
        }
        Commands::Shop { session, merchant } => {
            let config = require_config(pre_config, &cli.config).await?;
            let live = LiveState::open(&config)?;
            live.sessions.load(&session.player, &session.save)?;
            let view = live.shop.shop_view(&session.player, &session.save, &merchant)?;
            println!("{} ({:?}) - gold {}/{}", view.name, view.shop_type, view.current_gold, view.max_gold);
            if !view.buys_items {
                println!("This merchant does not buy items.");
            }
            for item in &view.items {
                println!(
                    "  {:<20} buy {:>5}  sell {:>5}  stock {}/{}",
                    item.name, item.buy_price, item.sell_price, item.current_stock, item.max_stock
                );
            }
            println!("Restock in {:.1} min", view.minutes_until_restock);
        }
        Commands::Buy(args) => {
            let config = require_config(pre_config, &cli.config).await?;
            trade(&config, TransactionKind::Buy, args)?;
        }
        Commands::Sell(args) => {
            let config = require_config(pre_config, &cli.config).await?;
            trade(&config, TransactionKind::Sell, args)?;
        }
    }

    Ok(())
}

async fn require_config(pre_config: Option<Config>, path: &str) -> Result<Config> {
    match pre_config {
        Some(config) => Ok(config),
        None => Config::load(path).await,
    }
}

fn trade(config: &Config, kind: TransactionKind, args: TradeArgs) -> Result<()> {
    let live = LiveState::open(config)?;
    let (player, save_id) = (&args.session.player, &args.session.save);
    live.sessions.load(player, save_id)?;

    if kind == TransactionKind::Sell {
        live.shop.stage_sale(player, save_id, &args.item, args.quantity)?;
    }
    let request = ShopTransactionRequest::new(kind, player, save_id, &args.merchant, &args.item, args.quantity);
    let result = live.shop.execute(&request);
    let response = ShopResponse::from_result(&result);
    println!("{}", serde_json::to_string_pretty(&response)?);

    match result {
        Ok(receipt) => {
            if !receipt.delta.is_empty() {
                println!("{}", serde_json::to_string_pretty(&receipt.delta.to_json())?);
            }
            if args.persist {
                live.sessions.save_to_disk(player, save_id)?;
                println!("Saved {}/{}", player, save_id);
            }
            Ok(())
        }
        Err(e) => {
            if kind == TransactionKind::Sell {
                // Put the staged items back.
                live.sessions.reload(player, save_id)?;
                warn!("Sale failed, session reloaded from storage");
            }
            Err(anyhow!("{} failed: {}", if kind == TransactionKind::Buy { "Buy" } else { "Sale" }, e))
        }
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|cfg| cfg.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Only echo to the console when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
