//! Merchant ledger behaviour: randomized delta sequences, restock windows and
//! concurrent access through the transactional accessor.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use hearthkeep::game::{ManualClock, MerchantBaseline, MerchantEconomy, StockEntry};

fn baseline() -> MerchantBaseline {
    MerchantBaseline {
        starting_gold: 500,
        inventory: vec![
            StockEntry {
                item_id: "longsword".to_string(),
                stock: 3,
                max_stock: 5,
            },
            StockEntry {
                item_id: "shield".to_string(),
                stock: 2,
                max_stock: 2,
            },
        ],
        restock_interval_minutes: 10,
    }
}

fn economy() -> (MerchantEconomy, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    (MerchantEconomy::new(clock.clone()), clock)
}

#[test]
fn random_delta_sequences_never_drive_stock_negative() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for round in 0..50 {
        let (economy, _) = economy();
        let player = format!("player-{}", round);
        economy.get_or_init_state(&player, "blacksmith", &baseline());

        let mut model: HashMap<&str, i64> = HashMap::from([("longsword", 3), ("shield", 2)]);
        let mut gold: i64 = 500;
        for _ in 0..200 {
            let item = if rng.gen_bool(0.5) { "longsword" } else { "shield" };
            let quantity_delta = rng.gen_range(-6..=4);
            let gold_delta = rng.gen_range(-120..=120);
            economy.update_inventory(&player, "blacksmith", item, quantity_delta, gold_delta);

            let stock = model.entry(item).or_default();
            *stock = (*stock + quantity_delta).max(0);
            gold = (gold + gold_delta).max(0);
        }

        let (state, restocked) = economy.get_or_init_state(&player, "blacksmith", &baseline());
        assert!(!restocked);
        assert_eq!(i64::from(state.stock_of("longsword")), model["longsword"]);
        assert_eq!(i64::from(state.stock_of("shield")), model["shield"]);
        assert_eq!(state.current_gold as i64, gold);
    }
}

#[test]
fn restock_happens_at_most_once_per_interval() {
    let (economy, clock) = economy();
    economy.get_or_init_state("p", "blacksmith", &baseline());
    economy.update_inventory("p", "blacksmith", "longsword", -3, 54);

    clock.advance(Duration::minutes(10));
    let (_, first) = economy.get_or_init_state("p", "blacksmith", &baseline());
    economy.update_inventory("p", "blacksmith", "longsword", -1, 18);
    let (state, second) = economy.get_or_init_state("p", "blacksmith", &baseline());

    assert!(first);
    assert!(!second);
    assert_eq!(state.stock_of("longsword"), 4);
    assert_eq!(state.current_gold, 518);
}

#[test]
fn interval_boundary_is_inclusive() {
    let (economy, clock) = economy();
    economy.get_or_init_state("p", "blacksmith", &baseline());
    economy.update_inventory("p", "blacksmith", "shield", -2, 0);

    clock.advance(Duration::minutes(10) - Duration::seconds(1));
    let (state, restocked) = economy.get_or_init_state("p", "blacksmith", &baseline());
    assert!(!restocked);
    assert_eq!(state.stock_of("shield"), 0);
    assert!(economy.time_until_restock("p", "blacksmith") > 0.0);

    clock.advance(Duration::seconds(1));
    assert_eq!(economy.time_until_restock("p", "blacksmith"), 0.0);
    let (state, restocked) = economy.get_or_init_state("p", "blacksmith", &baseline());
    assert!(restocked);
    assert_eq!(state.stock_of("shield"), 2);
    assert!((economy.time_until_restock("p", "blacksmith") - 10.0).abs() < 1e-9);
}

#[test]
fn restock_keeps_the_interval_seen_at_creation() {
    let (economy, clock) = economy();
    economy.get_or_init_state("p", "blacksmith", &baseline());
    let mut slower = baseline();
    slower.restock_interval_minutes = 70;

    clock.advance_minutes(10);
    let (state, restocked) = economy.get_or_init_state("p", "blacksmith", &slower);
    assert!(restocked);
    assert_eq!(state.restock_interval_minutes, 10);
}

#[test]
fn players_have_independent_ledgers() {
    let (economy, _) = economy();
    economy.get_or_init_state("alice", "blacksmith", &baseline());
    economy.get_or_init_state("bob", "blacksmith", &baseline());
    economy.update_inventory("alice", "blacksmith", "longsword", -3, 54);

    assert_eq!(economy.states_for_player("alice")["blacksmith"].stock_of("longsword"), 0);
    assert_eq!(economy.states_for_player("bob")["blacksmith"].stock_of("longsword"), 3);
}

#[test]
fn concurrent_withdrawals_through_with_state() {
    let (economy, _) = economy();
    let economy = Arc::new(economy);
    let base = baseline();

    let taken: u32 = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let economy = economy.clone();
                let base = &base;
                scope.spawn(move || {
                    let mut taken: u32 = 0;
                    for _ in 0..10 {
                        let ok = economy.with_state("p", "blacksmith", base, |state, _| {
                            if state.stock_of("longsword") == 0 {
                                return false;
                            }
                            state.apply_delta("longsword", -1, 18);
                            true
                        });
                        if ok {
                            taken += 1;
                        }
                    }
                    taken
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).sum()
    });

    assert_eq!(taken, 3);
    let (state, _) = economy.get_or_init_state("p", "blacksmith", &base);
    assert_eq!(state.stock_of("longsword"), 0);
    assert_eq!(state.current_gold, 554);
}
