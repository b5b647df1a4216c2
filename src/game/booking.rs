//! Booked performances and their time windows.
//!
//! A booking moves `Booked -> Ready -> Performed` when the player shows up
//! inside the window, or `Booked -> Missed -> Penalized` once the window has
//! passed. The penalty itself is applied by an external effects system, at
//! most once per booking.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::game::errors::GameError;
use crate::game::types::SaveData;

/// Length of the performance window observed in content, in game minutes.
pub const DEFAULT_EVENT_WINDOW_MINUTES: u32 = 60;

/// Start time used when a booking doesn't carry one (9 PM).
pub const DEFAULT_SHOW_TIME: u32 = 1260;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShowBooking {
    pub venue_id: String,
    pub day: u32,
    #[serde(default = "default_show_time")]
    pub show_time: u32,
    #[serde(default)]
    pub performed: bool,
    #[serde(default)]
    pub penalized: bool,
}

fn default_show_time() -> u32 {
    DEFAULT_SHOW_TIME
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    Ready,
    Performed,
    Missed,
    Penalized,
}

impl ShowBooking {
    pub fn new(venue_id: impl Into<String>, day: u32, show_time: u32) -> Self {
        Self {
            venue_id: venue_id.into(),
            day,
            show_time,
            performed: false,
            penalized: false,
        }
    }

    /// True while `show_time <= time <= show_time + window` on the booked day.
    pub fn in_window(&self, day: u32, time: u32, window: u32) -> bool {
        day == self.day && time >= self.show_time && time <= self.window_end(window)
    }

    fn window_end(&self, window: u32) -> u32 {
        self.show_time.saturating_add(window)
    }

    pub fn status(&self, day: u32, time: u32, window: u32) -> BookingStatus {
        if self.performed {
            return BookingStatus::Performed;
        }
        if self.penalized {
            return BookingStatus::Penalized;
        }
        if self.in_window(day, time, window) {
            return BookingStatus::Ready;
        }
        let window_passed =
            day > self.day || (day == self.day && time > self.window_end(window));
        if window_passed {
            BookingStatus::Missed
        } else {
            BookingStatus::Booked
        }
    }
}

/// Applies the consequences of a missed booking (reputation loss, fines...).
pub trait PenaltyEffects {
    fn apply_missed_show(&self, save: &mut SaveData, booking: &ShowBooking) -> Result<(), GameError>;
}

/// First booking that is ready right now, if any.
pub fn ready_booking(save: &SaveData, window: u32) -> Option<&ShowBooking> {
    save.booked_shows
        .iter()
        .find(|b| b.status(save.current_day, save.time_of_day, window) == BookingStatus::Ready)
}

/// Mark the ready booking at `venue_id` performed.
pub fn mark_performed(save: &mut SaveData, venue_id: &str, window: u32) -> Result<(), GameError> {
    let (day, time) = (save.current_day, save.time_of_day);
    let booking = save
        .booked_shows
        .iter_mut()
        .find(|b| b.venue_id == venue_id && b.status(day, time, window) == BookingStatus::Ready)
        .ok_or_else(|| {
            GameError::PolicyRejected(format!("no show ready to perform at {}", venue_id))
        })?;
    booking.performed = true;
    info!("Show performed at {} (day {})", venue_id, day);
    Ok(())
}

/// Penalise every missed booking that hasn't been penalised yet.
/// Returns how many penalties were applied.
pub fn apply_missed_penalties(
    save: &mut SaveData,
    window: u32,
    effects: &dyn PenaltyEffects,
) -> Result<usize, GameError> {
    let (day, time) = (save.current_day, save.time_of_day);
    let missed: Vec<usize> = save
        .booked_shows
        .iter()
        .enumerate()
        .filter(|(_, b)| b.status(day, time, window) == BookingStatus::Missed)
        .map(|(idx, _)| idx)
        .collect();

    for &idx in &missed {
        let booking = save.booked_shows[idx].clone();
        effects.apply_missed_show(save, &booking)?;
        save.booked_shows[idx].penalized = true;
        warn!("Missed show at {} on day {} penalized", booking.venue_id, booking.day);
    }
    Ok(missed.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingPenalty {
        calls: Cell<usize>,
    }

    impl PenaltyEffects for CountingPenalty {
        fn apply_missed_show(&self, save: &mut SaveData, _booking: &ShowBooking) -> Result<(), GameError> {
            self.calls.set(self.calls.get() + 1);
            save.fatigue += 1;
            Ok(())
        }
    }

    #[test]
    fn window_boundaries_are_inclusive() {
        let booking = ShowBooking::new("tavern", 2, 1260);
        let w = DEFAULT_EVENT_WINDOW_MINUTES;
        assert_eq!(booking.status(2, 1259, w), BookingStatus::Booked);
        assert_eq!(booking.status(2, 1260, w), BookingStatus::Ready);
        assert_eq!(booking.status(2, 1320, w), BookingStatus::Ready);
        assert_eq!(booking.status(2, 1321, w), BookingStatus::Missed);
        assert_eq!(booking.status(1, 1290, w), BookingStatus::Booked);
        assert_eq!(booking.status(3, 0, w), BookingStatus::Missed);
    }

    #[test]
    fn window_end_saturates() {
        let booking = ShowBooking::new("tavern", 2, u32::MAX - 5);
        assert_eq!(booking.status(2, u32::MAX, 60), BookingStatus::Ready);
        assert_eq!(booking.status(2, 100, 60), BookingStatus::Booked);
    }

    #[test]
    fn performed_only_when_ready() {
        let mut save = SaveData::default();
        save.current_day = 2;
        save.time_of_day = 1200;
        save.booked_shows.push(ShowBooking::new("tavern", 2, 1260));

        assert!(mark_performed(&mut save, "tavern", 60).is_err());
        save.time_of_day = 1270;
        assert_eq!(ready_booking(&save, 60).map(|b| b.venue_id.as_str()), Some("tavern"));
        mark_performed(&mut save, "tavern", 60).unwrap();
        assert!(ready_booking(&save, 60).is_none());
        assert_eq!(save.booked_shows[0].status(2, 1270, 60), BookingStatus::Performed);
    }

    #[test]
    fn missed_penalty_applies_once() {
        let mut save = SaveData::default();
        save.current_day = 4;
        save.booked_shows.push(ShowBooking::new("tavern", 3, 1260));
        let effects = CountingPenalty { calls: Cell::new(0) };

        assert_eq!(apply_missed_penalties(&mut save, 60, &effects).unwrap(), 1);
        assert_eq!(apply_missed_penalties(&mut save, 60, &effects).unwrap(), 0);
        assert_eq!(effects.calls.get(), 1);
        assert_eq!(save.fatigue, 1);
        assert_eq!(save.booked_shows[0].status(4, 0, 60), BookingStatus::Penalized);
    }
}
