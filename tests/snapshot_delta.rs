//! Deltas produced by session updates as the player moves through the day,
//! plus show bookings and logout.
mod common;

use std::collections::BTreeMap;

use hearthkeep::game::booking::{apply_missed_penalties, mark_performed};
use hearthkeep::game::{lock_session, GameError, PenaltyEffects, SaveData, ShowBooking};

const WINDOW: u32 = 60;

fn booked_save() -> SaveData {
    let mut save = common::save_with_gold(40);
    save.booked_shows.push(ShowBooking::new("tavern", 3, 1260));
    save
}

#[test]
fn evening_closes_the_forge_and_sends_brom_away() {
    let h = common::harness();
    h.seed("npub1alice", "slot1", booked_save());

    let mut save = h.save_of("npub1alice", "slot1");
    save.time_of_day = 1100;
    let delta = h.live.sessions.update("npub1alice", "slot1", save).unwrap();

    assert_eq!(delta.character.as_ref().unwrap().time_of_day, Some(1100));
    assert!(delta.location.is_none());
    let npcs = delta.npcs.unwrap();
    assert!(npcs.added.is_empty());
    assert_eq!(npcs.removed, vec!["brom".to_string()]);
    let expected: BTreeMap<String, bool> = [
        ("bakery".to_string(), false),
        ("forge".to_string(), false),
        ("tavern".to_string(), true),
    ]
    .into_iter()
    .collect();
    assert_eq!(delta.buildings, Some(expected));
    assert!(delta.event.is_none());
    assert!(delta.inventory.is_none());
}

#[test]
fn walking_into_the_tavern_at_showtime_flags_the_event() {
    let h = common::harness();
    h.seed("npub1alice", "slot1", booked_save());

    let mut save = h.save_of("npub1alice", "slot1");
    save.time_of_day = 1100;
    h.live.sessions.update("npub1alice", "slot1", save.clone()).unwrap();

    save.building = "tavern".to_string();
    save.time_of_day = 1270;
    let delta = h.live.sessions.update("npub1alice", "slot1", save.clone()).unwrap();

    assert_eq!(
        delta.location.as_ref().and_then(|l| l.building.clone()),
        Some("tavern".to_string())
    );
    assert_eq!(delta.npcs.as_ref().unwrap().added, vec!["brom".to_string()]);
    assert!(delta.buildings.is_none());
    let event = delta.event.unwrap();
    assert!(event.ready);
    assert_eq!(event.building, "tavern");

    let json = delta_json(&h);
    assert!(json.is_empty(), "no change since last snapshot: {:?}", json);

    // Perform: readiness clears on the next delta.
    mark_performed(&mut save, "tavern", WINDOW).unwrap();
    let delta = h.live.sessions.update("npub1alice", "slot1", save.clone()).unwrap();
    let event = delta.event.unwrap();
    assert!(!event.ready);
    assert_eq!(event.building, "");

    let err = mark_performed(&mut save, "tavern", WINDOW).unwrap_err();
    assert!(matches!(err, GameError::PolicyRejected(_)));
}

/// Keys of a delta produced by a no-op update.
fn delta_json(h: &common::Harness) -> Vec<String> {
    let save = h.save_of("npub1alice", "slot1");
    let delta = h.live.sessions.update("npub1alice", "slot1", save).unwrap();
    match delta.to_json() {
        serde_json::Value::Object(map) => map.keys().cloned().collect(),
        other => panic!("delta is not an object: {}", other),
    }
}

struct Fine(i32);

impl PenaltyEffects for Fine {
    fn apply_missed_show(&self, save: &mut SaveData, _booking: &ShowBooking) -> Result<(), GameError> {
        save.fatigue += self.0;
        Ok(())
    }
}

#[test]
fn missed_show_is_penalised_once() {
    let h = common::harness();
    h.seed("npub1alice", "slot1", booked_save());

    let mut save = h.save_of("npub1alice", "slot1");
    save.current_day = 4;
    save.time_of_day = 100;
    assert_eq!(apply_missed_penalties(&mut save, WINDOW, &Fine(3)).unwrap(), 1);
    assert_eq!(apply_missed_penalties(&mut save, WINDOW, &Fine(3)).unwrap(), 0);

    let delta = h.live.sessions.update("npub1alice", "slot1", save).unwrap();
    let character = delta.character.unwrap();
    assert_eq!(character.fatigue, Some(3));
    assert_eq!(character.current_day, Some(4));
    assert!(delta.event.is_none());

    let handle = h.live.sessions.get("npub1alice", "slot1").unwrap();
    let session = lock_session(&handle);
    assert!(session.save().booked_shows[0].penalized);
    assert!(session.ready_booking().is_none());
}

#[test]
fn logout_drops_session_and_merchant_ledgers() {
    let h = common::harness();
    h.seed("npub1alice", "slot1", common::save_with_gold(40));
    h.seed("npub1bob", "slot1", common::save_with_gold(40));
    h.live.shop.shop_view("npub1alice", "slot1", "blacksmith").unwrap();
    h.live.shop.shop_view("npub1alice", "slot1", "baker").unwrap();
    h.live.shop.shop_view("npub1bob", "slot1", "blacksmith").unwrap();

    h.live.logout("npub1alice", "slot1");

    assert!(h.live.sessions.get("npub1alice", "slot1").is_err());
    assert!(h.live.economy.states_for_player("npub1alice").is_empty());
    assert_eq!(h.live.economy.states_for_player("npub1bob").len(), 1);
    assert!(h.live.sessions.get("npub1bob", "slot1").is_ok());
}
