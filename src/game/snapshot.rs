//! Snapshot and delta engine.
//!
//! A [`Snapshot`] is a cheap, comparable projection of a session at one
//! instant. Two snapshots diff into a [`Delta`] that carries only the fields
//! that changed, so clients can patch their view instead of refetching the
//! whole save. Diffing never touches session state.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::game::booking::ready_booking;
use crate::game::inventory::total_gold;
use crate::game::types::{GearSlot, ItemStack, SaveData};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    // Character
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub fatigue: i32,
    pub hunger: i32,
    pub experience: u32,
    pub gold: u64,
    pub current_day: u32,
    pub time_of_day: u32,

    // Location
    pub location: String,
    pub district: String,
    pub building: String,
    pub npcs: Vec<String>,
    pub buildings: BTreeMap<String, bool>,

    // Inventory
    pub general_slots: Vec<Option<ItemStack>>,
    pub bag_slots: Vec<Option<ItemStack>>,
    pub equipment: BTreeMap<GearSlot, String>,

    // Booked show readiness
    pub event_ready: bool,
    pub event_ready_building: String,
}

impl Snapshot {
    /// Project the save plus the session's cached NPC and building lists.
    pub fn capture(
        save: &SaveData,
        npcs: &[String],
        buildings: &HashMap<String, bool>,
        event_window: u32,
    ) -> Self {
        let ready = ready_booking(save, event_window);
        Self {
            hp: save.hp,
            max_hp: save.max_hp,
            mana: save.mana,
            max_mana: save.max_mana,
            fatigue: save.fatigue,
            hunger: save.hunger,
            experience: save.experience,
            gold: total_gold(save),
            current_day: save.current_day,
            time_of_day: save.time_of_day,
            location: save.location.clone(),
            district: save.district.clone(),
            building: save.building.clone(),
            npcs: npcs.to_vec(),
            buildings: buildings.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            general_slots: save
                .inventory
                .general_slots
                .iter()
                .map(|slot| slot.stack.clone())
                .collect(),
            bag_slots: save
                .inventory
                .bag_slots()
                .iter()
                .map(|slot| slot.stack.clone())
                .collect(),
            equipment: save
                .inventory
                .gear
                .equipped
                .iter()
                .map(|(slot, stack)| (*slot, stack.item_id.clone()))
                .collect(),
            event_ready: ready.is_some(),
            event_ready_building: ready.map(|b| b.venue_id.clone()).unwrap_or_default(),
        }
    }
}

// ============================================================================
// Delta
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mana: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_mana: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatigue: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hunger: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gold: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<u32>,
}

impl CharacterDelta {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcDelta {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    /// Slot was cleared.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub empty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDelta {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub general_slots: BTreeMap<usize, SlotDelta>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bag_slots: BTreeMap<usize, SlotDelta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDelta {
    pub ready: bool,
    pub building: String,
}

/// Field-level difference between two snapshots. `None` means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<CharacterDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npcs: Option<NpcDelta>,
    /// Buildings whose open state is new or changed: building id -> is open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buildings: Option<BTreeMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<InventoryDelta>,
    /// Gear slot -> item id, `None` when the slot was emptied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment: Option<BTreeMap<GearSlot, Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventDelta>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Transport form: a JSON object holding only the changed fields.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
    (old != new).then(|| new.clone())
}

/// Compare two snapshots field by field.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Delta {
    let mut delta = Delta::default();

    let character = CharacterDelta {
        hp: changed(&old.hp, &new.hp),
        max_hp: changed(&old.max_hp, &new.max_hp),
        mana: changed(&old.mana, &new.mana),
        max_mana: changed(&old.max_mana, &new.max_mana),
        fatigue: changed(&old.fatigue, &new.fatigue),
        hunger: changed(&old.hunger, &new.hunger),
        experience: changed(&old.experience, &new.experience),
        gold: changed(&old.gold, &new.gold),
        current_day: changed(&old.current_day, &new.current_day),
        time_of_day: changed(&old.time_of_day, &new.time_of_day),
    };
    if !character.is_empty() {
        delta.character = Some(character);
    }

    if old.location != new.location || old.district != new.district || old.building != new.building {
        delta.location = Some(LocationDelta {
            location: changed(&old.location, &new.location),
            district: changed(&old.district, &new.district),
            building: changed(&old.building, &new.building),
        });
    }

    let old_npcs: BTreeSet<&String> = old.npcs.iter().collect();
    let new_npcs: BTreeSet<&String> = new.npcs.iter().collect();
    let npcs = NpcDelta {
        added: new_npcs.difference(&old_npcs).map(|s| (*s).clone()).collect(),
        removed: old_npcs.difference(&new_npcs).map(|s| (*s).clone()).collect(),
    };
    if !npcs.added.is_empty() || !npcs.removed.is_empty() {
        delta.npcs = Some(npcs);
    }

    let buildings: BTreeMap<String, bool> = new
        .buildings
        .iter()
        .filter(|(id, open)| old.buildings.get(*id) != Some(*open))
        .map(|(id, open)| (id.clone(), *open))
        .collect();
    if !buildings.is_empty() {
        delta.buildings = Some(buildings);
    }

    let inventory = InventoryDelta {
        general_slots: diff_slots(&old.general_slots, &new.general_slots),
        bag_slots: diff_slots(&old.bag_slots, &new.bag_slots),
    };
    if !inventory.general_slots.is_empty() || !inventory.bag_slots.is_empty() {
        delta.inventory = Some(inventory);
    }

    let mut equipment: BTreeMap<GearSlot, Option<String>> = new
        .equipment
        .iter()
        .filter(|(slot, item)| old.equipment.get(*slot) != Some(*item))
        .map(|(slot, item)| (*slot, Some(item.clone())))
        .collect();
    for slot in old.equipment.keys() {
        if !new.equipment.contains_key(slot) {
            equipment.insert(*slot, None);
        }
    }
    if !equipment.is_empty() {
        delta.equipment = Some(equipment);
    }

    if old.event_ready != new.event_ready || old.event_ready_building != new.event_ready_building {
        delta.event = Some(EventDelta {
            ready: new.event_ready,
            building: new.event_ready_building.clone(),
        });
    }

    delta
}

fn diff_slots(old: &[Option<ItemStack>], new: &[Option<ItemStack>]) -> BTreeMap<usize, SlotDelta> {
    let len = old.len().max(new.len());
    (0..len)
        .filter_map(|idx| {
            let before = old.get(idx).cloned().flatten();
            let after = new.get(idx).cloned().flatten();
            if before == after {
                return None;
            }
            let slot = match after {
                Some(stack) => SlotDelta {
                    item_id: Some(stack.item_id),
                    quantity: Some(stack.quantity),
                    empty: false,
                },
                None => SlotDelta {
                    empty: true,
                    ..SlotDelta::default()
                },
            };
            Some((idx, slot))
        })
        .collect()
}
