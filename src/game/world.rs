//! Location lookups the session caches: which buildings are open and which
//! NPCs are around at a given game time.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::game::catalog::read_json;
use crate::game::errors::GameError;

pub trait WorldView: Send + Sync {
    /// Open/closed state of every building in a district at `time_of_day`.
    fn building_states(
        &self,
        location: &str,
        district: &str,
        time_of_day: u32,
    ) -> Result<HashMap<String, bool>, GameError>;

    /// NPC ids present at a spot at `time_of_day`. Empty `building` means outdoors.
    fn npcs_at(&self, location: &str, district: &str, building: &str, time_of_day: u32) -> Vec<String>;
}

/// Opening hours in game minutes. `open > close` wraps past midnight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hours {
    pub open: u32,
    pub close: u32,
}

impl Hours {
    pub fn always() -> Self {
        Self { open: 0, close: 1440 }
    }

    pub fn contains(&self, time_of_day: u32) -> bool {
        if self.open <= self.close {
            time_of_day >= self.open && time_of_day < self.close
        } else {
            time_of_day >= self.open || time_of_day < self.close
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingSeed {
    pub id: String,
    pub location: String,
    pub district: String,
    pub hours: Hours,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcScheduleEntry {
    pub location: String,
    pub district: String,
    #[serde(default)]
    pub building: String,
    pub hours: Hours,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcSeed {
    pub id: String,
    pub schedule: Vec<NpcScheduleEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSeed {
    #[serde(default)]
    pub buildings: Vec<BuildingSeed>,
    #[serde(default)]
    pub npcs: Vec<NpcSeed>,
}

/// World view backed by fixed building hours and NPC schedules.
#[derive(Debug, Clone, Default)]
pub struct StaticWorld {
    seed: WorldSeed,
}

impl StaticWorld {
    pub fn new(seed: WorldSeed) -> Self {
        Self { seed }
    }

    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<Self, GameError> {
        let seed: WorldSeed = read_json(path.as_ref())?;
        log::info!(
            "World loaded: {} buildings, {} npcs",
            seed.buildings.len(),
            seed.npcs.len()
        );
        Ok(Self::new(seed))
    }
}

impl WorldView for StaticWorld {
    fn building_states(
        &self,
        location: &str,
        district: &str,
        time_of_day: u32,
    ) -> Result<HashMap<String, bool>, GameError> {
        Ok(self
            .seed
            .buildings
            .iter()
            .filter(|b| b.location == location && b.district == district)
            .map(|b| (b.id.clone(), b.hours.contains(time_of_day)))
            .collect())
    }

    fn npcs_at(&self, location: &str, district: &str, building: &str, time_of_day: u32) -> Vec<String> {
        let mut ids: Vec<String> = self
            .seed
            .npcs
            .iter()
            .filter(|npc| {
                npc.schedule.iter().any(|entry| {
                    entry.location == location
                        && entry.district == district
                        && entry.building == building
                        && entry.hours.contains(time_of_day)
                })
            })
            .map(|npc| npc.id.clone())
            .collect();
        ids.sort();
        ids
    }
}
