//! Test utilities & fixtures.
//! Content seeds live under `tests/test-data-int`; saves go to a throwaway sled dir.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearthkeep::config::Config;
use hearthkeep::game::{
    ManualClock, SaveData, SaveStore, SledSaveStore, Slot, StaticCatalog, StaticWorld,
};
use hearthkeep::game::types::GOLD_ITEM_ID;
use hearthkeep::live::LiveState;

/// Return the path to the static integration test fixture directory.
pub fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("test-data-int")
}

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> String {
    fixture_root().join(name).to_string_lossy().into_owned()
}

#[allow(dead_code)]
pub fn catalog() -> StaticCatalog {
    let root = fixture_root();
    StaticCatalog::load_from_json(root.join("items.json"), root.join("merchants.json")).expect("catalog fixture")
}

#[allow(dead_code)]
pub fn world() -> StaticWorld {
    StaticWorld::load_from_json(fixture_root().join("world.json")).expect("world fixture")
}

#[allow(dead_code)]
pub struct Harness {
    pub live: LiveState,
    pub clock: Arc<ManualClock>,
    pub saves: Arc<SledSaveStore>,
    _dir: tempfile::TempDir,
}

#[allow(dead_code)]
impl Harness {
    /// Store `save` durably and load it into a session.
    pub fn seed(&self, player: &str, save_id: &str, save: SaveData) {
        self.saves.write_save(player, save_id, &save).expect("write save");
        self.live.sessions.load(player, save_id).expect("load session");
    }

    pub fn save_of(&self, player: &str, save_id: &str) -> SaveData {
        let handle = self.live.sessions.get(player, save_id).expect("resident session");
        let save = hearthkeep::game::lock_session(&handle).save().clone();
        save
    }
}

#[allow(dead_code)]
pub fn harness() -> Harness {
    harness_with(Config::default())
}

#[allow(dead_code)]
pub fn harness_with(config: Config) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let saves = Arc::new(SledSaveStore::open(dir.path().join("saves")).expect("sled"));
    let clock = Arc::new(ManualClock::starting_now());
    let live = LiveState::assemble(
        &config,
        saves.clone(),
        Arc::new(catalog()),
        Arc::new(world()),
        clock.clone(),
    );
    Harness {
        live,
        clock,
        saves,
        _dir: dir,
    }
}

/// Default save standing in the forge mid-morning with `gold` in the first slot.
#[allow(dead_code)]
pub fn save_with_gold(gold: u32) -> SaveData {
    let mut save = SaveData::default();
    save.building = "forge".to_string();
    save.current_day = 3;
    save.time_of_day = 610;
    if gold > 0 {
        save.inventory.general_slots[0] = Slot::holding(GOLD_ITEM_ID, gold);
    }
    save
}
