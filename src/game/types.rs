use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::booking::ShowBooking;
use crate::game::errors::GameError;

pub const SAVE_SCHEMA_VERSION: u8 = 1;

/// Item id of the coin stacks that make up a player's gold.
pub const GOLD_ITEM_ID: &str = "gold-piece";

/// Number of general (belt) slots every character has.
pub const GENERAL_SLOT_COUNT: usize = 4;

/// Number of slots inside a standard backpack.
pub const BAG_SLOT_COUNT: usize = 20;

/// Minutes in one game day; `time_of_day` is always below this.
pub const MINUTES_PER_DAY: u32 = 1440;

// ============================================================================
// Inventory slots
// ============================================================================

/// A quantity of one item occupying a slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemStack {
    pub item_id: String,
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// One inventory cell. `None` means empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    #[serde(default)]
    pub stack: Option<ItemStack>,
}

impl Slot {
    pub fn empty() -> Self {
        Self { stack: None }
    }

    pub fn holding(item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            stack: Some(ItemStack::new(item_id, quantity)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_none()
    }

    /// Quantity of `item_id` in this slot, zero if it holds something else.
    pub fn quantity_of(&self, item_id: &str) -> u32 {
        match &self.stack {
            Some(stack) if stack.item_id == item_id => stack.quantity,
            _ => 0,
        }
    }

    pub fn holds(&self, item_id: &str) -> bool {
        self.quantity_of(item_id) > 0
    }

    pub fn clear(&mut self) {
        self.stack = None;
    }
}

/// Named equipment positions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GearSlot {
    MainHand,
    OffHand,
    Armor,
    Helmet,
    Boots,
    Gloves,
    Ring1,
    Ring2,
    Necklace,
    Cloak,
}

/// A worn container (backpack) and the slots inside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerSlot {
    pub item_id: String,
    pub contents: Vec<Slot>,
}

impl ContainerSlot {
    pub fn backpack() -> Self {
        Self {
            item_id: "backpack".to_string(),
            contents: vec![Slot::empty(); BAG_SLOT_COUNT],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GearSlots {
    #[serde(default)]
    pub equipped: BTreeMap<GearSlot, ItemStack>,
    #[serde(default)]
    pub bag: Option<ContainerSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Inventory {
    pub general_slots: Vec<Slot>,
    #[serde(default)]
    pub gear: GearSlots,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            general_slots: vec![Slot::empty(); GENERAL_SLOT_COUNT],
            gear: GearSlots {
                equipped: BTreeMap::new(),
                bag: Some(ContainerSlot::backpack()),
            },
        }
    }
}

impl Inventory {
    /// Backpack contents, empty when no bag is worn.
    pub fn bag_slots(&self) -> &[Slot] {
        self.gear
            .bag
            .as_ref()
            .map(|bag| bag.contents.as_slice())
            .unwrap_or(&[])
    }

    pub fn bag_slots_mut(&mut self) -> &mut [Slot] {
        match self.gear.bag.as_mut() {
            Some(bag) => bag.contents.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Reject shapes the rest of the core never expects to see.
    pub fn validate(&self) -> Result<(), GameError> {
        if self.general_slots.len() > GENERAL_SLOT_COUNT {
            return Err(GameError::InvalidRequest(format!(
                "{} general slots (max {})",
                self.general_slots.len(),
                GENERAL_SLOT_COUNT
            )));
        }
        if self.bag_slots().len() > BAG_SLOT_COUNT {
            return Err(GameError::InvalidRequest(format!(
                "{} bag slots (max {})",
                self.bag_slots().len(),
                BAG_SLOT_COUNT
            )));
        }
        let stacks = self
            .general_slots
            .iter()
            .chain(self.bag_slots().iter())
            .filter_map(|slot| slot.stack.as_ref())
            .chain(self.gear.equipped.values());
        for stack in stacks {
            if stack.item_id.trim().is_empty() {
                return Err(GameError::InvalidRequest(
                    "slot holds an item with an empty id".to_string(),
                ));
            }
            if stack.quantity == 0 {
                return Err(GameError::InvalidRequest(format!(
                    "slot holds zero {}",
                    stack.item_id
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Save payload
// ============================================================================

fn default_ability() -> i32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    #[serde(default = "default_ability")]
    pub strength: i32,
    #[serde(default = "default_ability")]
    pub dexterity: i32,
    #[serde(default = "default_ability")]
    pub constitution: i32,
    #[serde(default = "default_ability")]
    pub intelligence: i32,
    #[serde(default = "default_ability")]
    pub wisdom: i32,
    #[serde(default = "default_ability")]
    pub charisma: i32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

/// The mutable part of a save file that lives in a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveData {
    #[serde(default)]
    pub schema_version: u8,
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub experience: u32,
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default)]
    pub mana: i32,
    #[serde(default)]
    pub max_mana: i32,
    #[serde(default)]
    pub fatigue: i32,
    #[serde(default)]
    pub hunger: i32,
    #[serde(default)]
    pub stats: Stats,
    pub location: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub building: String,
    pub current_day: u32,
    pub time_of_day: u32,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub booked_shows: Vec<ShowBooking>,
    #[serde(default)]
    pub known_spells: Vec<String>,
    #[serde(default)]
    pub locations_discovered: Vec<String>,
}

impl Default for SaveData {
    fn default() -> Self {
        Self {
            schema_version: SAVE_SCHEMA_VERSION,
            race: String::new(),
            class: String::new(),
            experience: 0,
            hp: 10,
            max_hp: 10,
            mana: 0,
            max_mana: 0,
            fatigue: 0,
            hunger: 2,
            stats: Stats::default(),
            location: "kingdom".to_string(),
            district: "center".to_string(),
            building: String::new(),
            current_day: 1,
            time_of_day: 720,
            inventory: Inventory::default(),
            booked_shows: Vec::new(),
            known_spells: Vec::new(),
            locations_discovered: Vec::new(),
        }
    }
}

impl SaveData {
    /// Hour of the game day (0..23).
    pub fn current_hour(&self) -> u32 {
        self.time_of_day / 60
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if self.time_of_day >= MINUTES_PER_DAY {
            return Err(GameError::InvalidRequest(format!(
                "time_of_day {} out of range",
                self.time_of_day
            )));
        }
        if self.location.trim().is_empty() {
            return Err(GameError::InvalidRequest("save has no location".to_string()));
        }
        if let Some(booking) = self
            .booked_shows
            .iter()
            .find(|b| b.show_time >= MINUTES_PER_DAY)
        {
            return Err(GameError::InvalidRequest(format!(
                "show at {} starts at {} (out of range)",
                booking.venue_id, booking.show_time
            )));
        }
        self.inventory.validate()
    }
}
