//! Inventory and gold primitives over a player's save payload.
//!
//! Placement order is bag before belt: existing bag stacks, existing general
//! stacks, empty bag slots, then empty general slots.

use log::debug;

use super::catalog::ItemRecord;
use super::errors::GameError;
use super::types::{Inventory, ItemStack, SaveData, Slot, GOLD_ITEM_ID};

// ============================================================================
// Gold
// ============================================================================

/// Total gold carried across general slots and the bag.
pub fn total_gold(save: &SaveData) -> u64 {
    let inventory = &save.inventory;
    inventory
        .general_slots
        .iter()
        .chain(inventory.bag_slots().iter())
        .map(|slot| slot.quantity_of(GOLD_ITEM_ID) as u64)
        .sum()
}

/// Remove `amount` gold, general slots first. All-or-nothing: returns false and
/// leaves the payload untouched when the player can't cover it.
pub fn deduct_gold(save: &mut SaveData, amount: u64) -> bool {
    if amount == 0 {
        return true;
    }
    if total_gold(save) < amount {
        return false;
    }

    let mut remaining = amount;
    let inventory = &mut save.inventory;
    for slot in inventory.general_slots.iter_mut() {
        if remaining == 0 {
            break;
        }
        remaining = take_from_slot(slot, GOLD_ITEM_ID, remaining);
    }
    for slot in inventory.bag_slots_mut().iter_mut() {
        if remaining == 0 {
            break;
        }
        remaining = take_from_slot(slot, GOLD_ITEM_ID, remaining);
    }
    remaining == 0
}

/// Add gold onto an existing pile, else into the first empty slot
/// (general before bag).
pub fn credit_gold(inventory: &mut Inventory, amount: u64) -> Result<(), GameError> {
    if amount == 0 {
        return Ok(());
    }
    let amount = u32::try_from(amount)
        .map_err(|_| GameError::InvalidRequest(format!("gold amount {} too large", amount)))?;

    if let Some(stack) = inventory
        .general_slots
        .iter_mut()
        .chain(inventory.gear.bag.iter_mut().flat_map(|bag| bag.contents.iter_mut()))
        .filter_map(|slot| slot.stack.as_mut())
        .find(|stack| stack.item_id == GOLD_ITEM_ID)
    {
        stack.quantity = stack
            .quantity
            .checked_add(amount)
            .ok_or_else(|| GameError::Internal("gold stack overflow".to_string()))?;
        debug!("Added {}g to existing gold stack (now {})", amount, stack.quantity);
        return Ok(());
    }

    if let Some(slot) = inventory
        .general_slots
        .iter_mut()
        .chain(inventory.gear.bag.iter_mut().flat_map(|bag| bag.contents.iter_mut()))
        .find(|slot| slot.is_empty())
    {
        slot.stack = Some(ItemStack::new(GOLD_ITEM_ID, amount));
        debug!("Added {}g to an empty slot", amount);
        return Ok(());
    }

    Err(GameError::InventoryFull {
        item: GOLD_ITEM_ID.to_string(),
    })
}

// ============================================================================
// Items
// ============================================================================

/// Place up to `quantity` of `item` and return how many fit. Fails with
/// `InventoryFull` only when nothing at all could be placed.
pub fn add_item(save: &mut SaveData, item: &ItemRecord, quantity: u32) -> Result<u32, GameError> {
    if quantity == 0 {
        return Err(GameError::InvalidRequest("cannot add zero items".to_string()));
    }
    let max_stack = item.max_stack.max(1);
    let mut remaining = quantity;
    let inventory = &mut save.inventory;

    remaining = top_up_stacks(inventory.bag_slots_mut(), &item.id, max_stack, remaining);
    remaining = top_up_stacks(&mut inventory.general_slots, &item.id, max_stack, remaining);
    remaining = fill_empty_slots(inventory.bag_slots_mut(), &item.id, max_stack, remaining);
    remaining = fill_empty_slots(&mut inventory.general_slots, &item.id, max_stack, remaining);

    let placed = quantity - remaining;
    if placed == 0 {
        debug!("No room for {}x {}", quantity, item.id);
        return Err(GameError::InventoryFull {
            item: item.id.clone(),
        });
    }
    if remaining > 0 {
        debug!(
            "Inventory full - added {}/{} {} ({} couldn't fit)",
            placed, quantity, item.id, remaining
        );
    }
    Ok(placed)
}

/// Remove `quantity` of `item_id`, general slots first. All-or-nothing.
pub fn remove_item(save: &mut SaveData, item_id: &str, quantity: u32) -> Result<u32, GameError> {
    if quantity == 0 {
        return Err(GameError::InvalidRequest("cannot remove zero items".to_string()));
    }
    let have = item_quantity(save, item_id);
    if have < quantity {
        return Err(GameError::InvalidRequest(format!(
            "not enough {} (have {}, need {})",
            item_id, have, quantity
        )));
    }

    let mut remaining = quantity as u64;
    let inventory = &mut save.inventory;
    for slot in inventory.general_slots.iter_mut() {
        remaining = take_from_slot(slot, item_id, remaining);
    }
    for slot in inventory.bag_slots_mut().iter_mut() {
        remaining = take_from_slot(slot, item_id, remaining);
    }
    Ok(quantity)
}

pub fn has_item(save: &SaveData, item_id: &str) -> bool {
    item_quantity(save, item_id) > 0
}

/// Quantity carried in general slots and the bag (equipped gear excluded).
pub fn item_quantity(save: &SaveData, item_id: &str) -> u32 {
    save.inventory
        .general_slots
        .iter()
        .chain(save.inventory.bag_slots().iter())
        .map(|slot| slot.quantity_of(item_id))
        .fold(0u32, |acc, qty| acc.saturating_add(qty))
}

// ============================================================================
// Slot helpers
// ============================================================================

fn take_from_slot(slot: &mut Slot, item_id: &str, remaining: u64) -> u64 {
    if remaining == 0 {
        return 0;
    }
    let Some(stack) = slot.stack.as_mut() else {
        return remaining;
    };
    if stack.item_id != item_id {
        return remaining;
    }
    let held = stack.quantity as u64;
    if held > remaining {
        stack.quantity -= remaining as u32;
        0
    } else {
        slot.clear();
        remaining - held
    }
}

fn top_up_stacks(slots: &mut [Slot], item_id: &str, max_stack: u32, mut remaining: u32) -> u32 {
    for stack in slots.iter_mut().filter_map(|slot| slot.stack.as_mut()) {
        if remaining == 0 {
            break;
        }
        if stack.item_id != item_id || stack.quantity >= max_stack {
            continue;
        }
        let can_add = (max_stack - stack.quantity).min(remaining);
        stack.quantity += can_add;
        remaining -= can_add;
    }
    remaining
}

fn fill_empty_slots(slots: &mut [Slot], item_id: &str, max_stack: u32, mut remaining: u32) -> u32 {
    for slot in slots.iter_mut() {
        if remaining == 0 {
            break;
        }
        if !slot.is_empty() {
            continue;
        }
        let to_add = remaining.min(max_stack);
        slot.stack = Some(ItemStack::new(item_id, to_add));
        remaining -= to_add;
    }
    remaining
}

// ============================================================================
// Unit Tests
// ============================================================================
