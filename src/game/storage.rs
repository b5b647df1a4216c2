use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sled::IVec;

use crate::game::errors::GameError;
use crate::game::types::{SaveData, SAVE_SCHEMA_VERSION};

const TREE_SAVES: &str = "hearthkeep_saves";

/// Durable save storage. The live-state core only reads through `load_by_id`;
/// `write_save` is reached through an explicit save-to-disk request.
pub trait SaveStore: Send + Sync {
    fn load_by_id(&self, player: &str, save_id: &str) -> Result<SaveData, GameError>;
    fn write_save(&self, player: &str, save_id: &str, save: &SaveData) -> Result<(), GameError>;
    fn list_saves(&self) -> Result<Vec<(String, String)>, GameError>;
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct SledSaveStoreBuilder {
    path: PathBuf,
    temporary: bool,
}

impl SledSaveStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temporary: false,
        }
    }

    /// Delete the database when the store is dropped.
    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    pub fn open(self) -> Result<SledSaveStore, GameError> {
        std::fs::create_dir_all(&self.path)?;
        let db = sled::Config::new()
            .path(&self.path)
            .temporary(self.temporary)
            .open()?;
        SledSaveStore::from_db(db)
    }
}

/// Sled-backed save files keyed by player and save id.
pub struct SledSaveStore {
    _db: sled::Db,
    saves: sled::Tree,
}

impl SledSaveStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GameError> {
        SledSaveStoreBuilder::new(path.as_ref()).open()
    }

    fn from_db(db: sled::Db) -> Result<Self, GameError> {
        let saves = db.open_tree(TREE_SAVES)?;
        Ok(Self { _db: db, saves })
    }

    fn save_key(player: &str, save_id: &str) -> Vec<u8> {
        format!("saves:{}:{}", player, save_id).into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, GameError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, GameError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }
}

impl SaveStore for SledSaveStore {
    fn load_by_id(&self, player: &str, save_id: &str) -> Result<SaveData, GameError> {
        let key = Self::save_key(player, save_id);
        let Some(bytes) = self.saves.get(&key)? else {
            return Err(GameError::NotFound(format!("save: {}:{}", player, save_id)));
        };
        let record: SaveData = Self::deserialize(bytes)?;
        if record.schema_version != SAVE_SCHEMA_VERSION {
            return Err(GameError::SchemaMismatch {
                entity: "save",
                expected: SAVE_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    fn write_save(&self, player: &str, save_id: &str, save: &SaveData) -> Result<(), GameError> {
        save.validate()?;
        let mut record = save.clone();
        record.schema_version = SAVE_SCHEMA_VERSION;
        let key = Self::save_key(player, save_id);
        self.saves.insert(key, Self::serialize(&record)?)?;
        self.saves.flush()?;
        Ok(())
    }

    fn list_saves(&self) -> Result<Vec<(String, String)>, GameError> {
        let mut ids = Vec::new();
        for entry in self.saves.scan_prefix(b"saves:") {
            let (key, _) = entry?;
            let text = String::from_utf8_lossy(&key);
            // save ids never contain ':'; player identities might
            if let Some((player, save_id)) = text
                .strip_prefix("saves:")
                .and_then(|rest| rest.rsplit_once(':'))
            {
                ids.push((player.to_string(), save_id.to_string()));
            }
        }
        Ok(ids)
    }
}

/// In-process save store for tests and dry runs. Nothing survives the process.
#[derive(Default)]
pub struct MemorySaveStore {
    saves: Mutex<HashMap<(String, String), SaveData>>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a save without validation.
    pub fn insert(&self, player: &str, save_id: &str, save: SaveData) {
        let mut saves = self.saves.lock().unwrap_or_else(|e| e.into_inner());
        saves.insert((player.to_string(), save_id.to_string()), save);
    }
}

impl SaveStore for MemorySaveStore {
    fn load_by_id(&self, player: &str, save_id: &str) -> Result<SaveData, GameError> {
        let saves = self.saves.lock().unwrap_or_else(|e| e.into_inner());
        saves
            .get(&(player.to_string(), save_id.to_string()))
            .cloned()
            .ok_or_else(|| GameError::NotFound(format!("save: {}:{}", player, save_id)))
    }

    fn write_save(&self, player: &str, save_id: &str, save: &SaveData) -> Result<(), GameError> {
        save.validate()?;
        self.insert(player, save_id, save.clone());
        Ok(())
    }

    fn list_saves(&self) -> Result<Vec<(String, String)>, GameError> {
        let saves = self.saves.lock().unwrap_or_else(|e| e.into_inner());
        Ok(saves.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_load() {
        let dir = tempdir().unwrap();
        let store = SledSaveStore::open(dir.path()).unwrap();
        let mut save = SaveData::default();
        save.schema_version = 0;
        save.experience = 250;

        store.write_save("npub1alice", "slot1", &save).unwrap();
        let loaded = store.load_by_id("npub1alice", "slot1").unwrap();
        assert_eq!(loaded.experience, 250);
        assert_eq!(loaded.schema_version, SAVE_SCHEMA_VERSION);
    }

    #[test]
    fn missing_save_is_not_found() {
        let dir = tempdir().unwrap();
        let store = SledSaveStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load_by_id("npub1nobody", "slot1"),
            Err(GameError::NotFound(_))
        ));
    }

    #[test]
    fn invalid_save_is_not_written() {
        let dir = tempdir().unwrap();
        let store = SledSaveStore::open(dir.path()).unwrap();
        let mut save = SaveData::default();
        save.time_of_day = 5000;
        assert!(store.write_save("p", "s", &save).is_err());
        assert!(store.list_saves().unwrap().is_empty());
    }

    #[test]
    fn list_saves_splits_keys() {
        let dir = tempdir().unwrap();
        let store = SledSaveStoreBuilder::new(dir.path()).temporary().open().unwrap();
        store.write_save("npub1bob", "a", &SaveData::default()).unwrap();
        store.write_save("npub1bob", "b", &SaveData::default()).unwrap();

        let mut saves = store.list_saves().unwrap();
        saves.sort();
        assert_eq!(
            saves,
            vec![
                ("npub1bob".to_string(), "a".to_string()),
                ("npub1bob".to_string(), "b".to_string())
            ]
        );
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySaveStore::new();
        let mut save = SaveData::default();
        save.hp = 3;
        store.write_save("p", "s", &save).unwrap();
        assert_eq!(store.load_by_id("p", "s").unwrap().hp, 3);
        assert!(matches!(store.load_by_id("p", "t"), Err(GameError::NotFound(_))));
    }
}
