//! In-memory registry of live game sessions.
//!
//! Each loaded (player, save) pair has exactly one [`GameSession`], held behind
//! an `Arc<Mutex<_>>` handle. The registry lock only covers map mutation;
//! callers serialise work on a session by locking its handle. Lock order is
//! registry, then session; nothing here takes the registry lock while a
//! session guard is held.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::game::booking::{ready_booking, ShowBooking, DEFAULT_EVENT_WINDOW_MINUTES};
use crate::game::clock::Clock;
use crate::game::errors::GameError;
use crate::game::snapshot::{diff, Delta, Snapshot};
use crate::game::storage::SaveStore;
use crate::game::sync;
use crate::game::types::{SaveData, MINUTES_PER_DAY};
use crate::game::world::WorldView;
use crate::logutil::{escape_log, short_id};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub player: String,
    pub save_id: String,
}

impl SessionKey {
    pub fn new(player: impl Into<String>, save_id: impl Into<String>) -> Self {
        Self {
            player: player.into(),
            save_id: save_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", short_id(&self.player), escape_log(&self.save_id))
    }
}

/// Where the world caches were last computed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedSpot {
    location: String,
    district: String,
    building: String,
}

impl CachedSpot {
    fn of(save: &SaveData) -> Self {
        Self {
            location: save.location.clone(),
            district: save.district.clone(),
            building: save.building.clone(),
        }
    }
}

/// Absolute game time in minutes since day 0.
fn game_minutes(save: &SaveData) -> u64 {
    u64::from(save.current_day) * u64::from(MINUTES_PER_DAY) + u64::from(save.time_of_day)
}

/// One player's authoritative live state for one save.
#[derive(Debug, Clone)]
pub struct GameSession {
    key: SessionKey,
    save: SaveData,
    pub loaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_action_at: DateTime<Utc>,
    building_states: HashMap<String, bool>,
    npcs_present: Vec<String>,
    cache_spot: CachedSpot,
    npc_cache_hour: u64,
    building_cache_minute: u64,
    event_window: u32,
    last_snapshot: Snapshot,
}

impl GameSession {
    /// Build a session from a freshly loaded save: world caches and the first snapshot.
    pub fn new(
        key: SessionKey,
        save: SaveData,
        world: &dyn WorldView,
        now: DateTime<Utc>,
        event_window: u32,
    ) -> Result<Self, GameError> {
        save.validate()?;
        let spot = CachedSpot::of(&save);
        let npcs_present = world.npcs_at(&spot.location, &spot.district, &spot.building, save.time_of_day);
        let building_states = world.building_states(&spot.location, &spot.district, save.time_of_day)?;
        let last_snapshot = Snapshot::capture(&save, &npcs_present, &building_states, event_window);
        Ok(Self {
            key,
            cache_spot: spot,
            npc_cache_hour: game_minutes(&save) / 60,
            building_cache_minute: game_minutes(&save),
            save,
            loaded_at: now,
            updated_at: now,
            last_action_at: now,
            building_states,
            npcs_present,
            event_window,
            last_snapshot,
        })
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn save(&self) -> &SaveData {
        &self.save
    }

    pub fn building_states(&self) -> &HashMap<String, bool> {
        &self.building_states
    }

    pub fn npcs_present(&self) -> &[String] {
        &self.npcs_present
    }

    pub fn last_snapshot(&self) -> &Snapshot {
        &self.last_snapshot
    }

    pub fn event_window(&self) -> u32 {
        self.event_window
    }

    /// Booking whose performance window is open right now.
    pub fn ready_booking(&self) -> Option<&ShowBooking> {
        ready_booking(&self.save, self.event_window)
    }

    /// Replace the payload and bump the update timestamp. Caches and the
    /// snapshot are left alone; see [`SessionStore::apply`].
    pub fn replace_payload(&mut self, save: SaveData, now: DateTime<Utc>) {
        self.save = save;
        self.updated_at = now;
        self.last_action_at = now;
    }

    /// Recompute cached NPCs and building states if they are stale.
    ///
    /// NPCs are recomputed when the game hour or the spot changes; building
    /// states when an hour of game time has elapsed or the district changes.
    /// Returns true if anything was recomputed.
    pub fn refresh_world_cache(&mut self, world: &dyn WorldView, force: bool) -> Result<bool, GameError> {
        let spot = CachedSpot::of(&self.save);
        let now_minutes = game_minutes(&self.save);
        let moved_district = spot.location != self.cache_spot.location
            || spot.district != self.cache_spot.district;
        let moved = moved_district || spot.building != self.cache_spot.building;
        let mut refreshed = false;

        if force || moved || now_minutes / 60 != self.npc_cache_hour {
            self.npcs_present = world.npcs_at(
                &spot.location,
                &spot.district,
                &spot.building,
                self.save.time_of_day,
            );
            self.npc_cache_hour = now_minutes / 60;
            refreshed = true;
        }

        if force || moved_district || now_minutes.abs_diff(self.building_cache_minute) >= 60 {
            self.building_states =
                world.building_states(&spot.location, &spot.district, self.save.time_of_day)?;
            self.building_cache_minute = now_minutes;
            refreshed = true;
        }

        self.cache_spot = spot;
        Ok(refreshed)
    }

    pub fn capture_snapshot(&self) -> Snapshot {
        Snapshot::capture(
            &self.save,
            &self.npcs_present,
            &self.building_states,
            self.event_window,
        )
    }

    /// Capture a new snapshot, keep it, and return what changed since the last one.
    pub fn advance_snapshot(&mut self) -> Delta {
        let current = self.capture_snapshot();
        let delta = diff(&self.last_snapshot, &current);
        self.last_snapshot = current;
        delta
    }
}

pub type SessionHandle = Arc<Mutex<GameSession>>;

/// Lock a session handle.
pub fn lock_session(handle: &SessionHandle) -> MutexGuard<'_, GameSession> {
    sync::lock(handle)
}

pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
    storage: Arc<dyn SaveStore>,
    world: Arc<dyn WorldView>,
    clock: Arc<dyn Clock>,
    event_window: u32,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SaveStore>, world: Arc<dyn WorldView>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            storage,
            world,
            clock,
            event_window: DEFAULT_EVENT_WINDOW_MINUTES,
        }
    }

    pub fn with_event_window(mut self, minutes: u32) -> Self {
        self.event_window = minutes;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn build_session(&self, key: &SessionKey) -> Result<GameSession, GameError> {
        let save = self.storage.load_by_id(&key.player, &key.save_id)?;
        GameSession::new(
            key.clone(),
            save,
            self.world.as_ref(),
            self.clock.now(),
            self.event_window,
        )
    }

    /// Return the resident session, loading it from durable storage on first use.
    pub fn load(&self, player: &str, save_id: &str) -> Result<SessionHandle, GameError> {
        let key = SessionKey::new(player, save_id);
        if let Some(handle) = sync::read(&self.sessions).get(&key) {
            return Ok(handle.clone());
        }

        let mut sessions = sync::write(&self.sessions);
        // Another caller may have loaded it between the two locks.
        if let Some(handle) = sessions.get(&key) {
            return Ok(handle.clone());
        }
        let session = self.build_session(&key)?;
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(key.clone(), handle.clone());
        info!("Session loaded: {}", key);
        Ok(handle)
    }

    /// Re-read the save from durable storage, discarding unsaved in-memory
    /// changes. Existing handles see the reloaded state.
    pub fn reload(&self, player: &str, save_id: &str) -> Result<SessionHandle, GameError> {
        let key = SessionKey::new(player, save_id);
        let mut sessions = sync::write(&self.sessions);
        let fresh = self.build_session(&key)?;
        let handle = match sessions.get(&key) {
            Some(existing) => {
                *sync::lock(existing) = fresh;
                warn!("Session reloaded from storage, in-memory changes discarded: {}", key);
                existing.clone()
            }
            None => {
                let handle = Arc::new(Mutex::new(fresh));
                sessions.insert(key.clone(), handle.clone());
                info!("Session loaded (reload): {}", key);
                handle
            }
        };
        Ok(handle)
    }

    pub fn get(&self, player: &str, save_id: &str) -> Result<SessionHandle, GameError> {
        let key = SessionKey::new(player, save_id);
        sync::read(&self.sessions)
            .get(&key)
            .cloned()
            .ok_or_else(|| GameError::NotFound(format!("session: {}", key)))
    }

    /// Replace a resident session's payload. Returns the snapshot delta.
    pub fn update(&self, player: &str, save_id: &str, save: SaveData) -> Result<Delta, GameError> {
        let handle = self.get(player, save_id)?;
        let mut session = lock_session(&handle);
        self.apply(&mut session, save)
    }

    /// Commit a new payload to an already-locked session: replace it, refresh
    /// world caches, and advance the snapshot.
    pub fn apply(&self, session: &mut GameSession, save: SaveData) -> Result<Delta, GameError> {
        save.validate()?;
        session.replace_payload(save, self.clock.now());
        session.refresh_world_cache(self.world.as_ref(), false)?;
        let delta = session.advance_snapshot();
        debug!("Session updated: {} (delta empty: {})", session.key(), delta.is_empty());
        Ok(delta)
    }

    /// Drop a session from the registry. Absent keys are fine.
    pub fn unload(&self, player: &str, save_id: &str) {
        let key = SessionKey::new(player, save_id);
        if sync::write(&self.sessions).remove(&key).is_some() {
            info!("Session unloaded: {}", key);
        }
    }

    /// Resident keys, sorted.
    pub fn list_sessions(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = sync::read(&self.sessions).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Write the resident payload back to durable storage. Only ever called
    /// explicitly; nothing in the live-state core persists on its own.
    pub fn save_to_disk(&self, player: &str, save_id: &str) -> Result<(), GameError> {
        let handle = self.get(player, save_id)?;
        let save = lock_session(&handle).save().clone();
        self.storage.write_save(player, save_id, &save)?;
        info!("Session saved to disk: {}", SessionKey::new(player, save_id));
        Ok(())
    }
}
