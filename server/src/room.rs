//! Per-room option orchestration
//!
//! A [`Room`] owns the option store of one lobby together with the registered
//! game modes, change listeners and the profile store of its creator. It is
//! driven by the server loop, which passes in a [`Transport`] with every call
//! so that all sends for a room happen in the order its state was committed.

use crate::error::OptionError;
use crate::gamemode;
use crate::option_store::OptionStore;
use crate::profile::ProfileStore;
use crate::schema::{self, Gamemode};
use crate::settings::RoomSettings;
use crate::transport::{broadcast_chunked, Transport};
use crate::validator::{
    self, ChangeListener, ChangeOutcome, Decision, OptionChange, TaskCountGuard,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use shared::{
    category, option_name, priority, GameOption, OptionOp, OptionValue, MAX_TRANSITION_ITERATIONS,
    OPTION_CHUNK_SIZE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum operations per `Options` packet
    pub chunk_size: usize,
    /// Schema rebuild passes before a transition is abandoned
    pub max_transition_iterations: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            chunk_size: OPTION_CHUNK_SIZE,
            max_transition_iterations: MAX_TRANSITION_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone)]
struct Creator {
    client_id: u32,
    user_id: Option<String>,
}

pub struct Room {
    config: RoomConfig,
    store: OptionStore,
    gamemodes: Vec<Box<dyn Gamemode>>,
    active: usize,
    listeners: Vec<Box<dyn ChangeListener>>,
    creator: Option<Creator>,
    profiles: Box<dyn ProfileStore>,
    settings: RoomSettings,
}

impl Room {
    pub fn new(
        config: RoomConfig,
        gamemodes: Vec<Box<dyn Gamemode>>,
        profiles: Box<dyn ProfileStore>,
    ) -> Self {
        Self {
            config,
            store: OptionStore::new(),
            gamemodes,
            active: 0,
            listeners: vec![Box::new(TaskCountGuard)],
            creator: None,
            profiles,
            settings: RoomSettings::default(),
        }
    }

    /// A room with the built-in game modes
    pub fn with_builtin_gamemodes(config: RoomConfig, profiles: Box<dyn ProfileStore>) -> Self {
        Self::new(config, gamemode::builtin(), profiles)
    }

    pub fn add_listener(&mut self, listener: Box<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    pub fn store(&self) -> &OptionStore {
        &self.store
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn config(&self) -> RoomConfig {
        self.config
    }

    pub fn creator(&self) -> Option<u32> {
        self.creator.as_ref().map(|creator| creator.client_id)
    }

    pub fn is_initialized(&self) -> bool {
        self.creator.is_some()
    }

    pub fn active_gamemode(&self) -> Option<&str> {
        self.gamemodes.get(self.active).map(|mode| mode.name())
    }

    pub fn gamemode_names(&self) -> Vec<String> {
        self.gamemodes
            .iter()
            .map(|mode| mode.name().to_string())
            .collect()
    }

    /// Registers a connection with the room
    ///
    /// The first connection becomes the creator and builds the initial option
    /// set from its saved preferences. Everyone after that receives a full
    /// resync of the current options.
    pub fn on_client_joined<T: Transport + ?Sized>(
        &mut self,
        client_id: u32,
        user_id: Option<&str>,
        transport: &mut T,
    ) {
        if self.creator.is_some() {
            let chunks = self.sync_for(&[client_id], transport);
            debug!(
                "Synced {} options to client {} in {} chunks",
                self.store.len(),
                client_id,
                chunks
            );
            return;
        }

        info!("Client {} created the room", client_id);
        self.creator = Some(Creator {
            client_id,
            user_id: user_id.map(str::to_string),
        });

        if let Some(user_id) = user_id {
            match self.profiles.load_saved_options(user_id) {
                Ok(saved) => {
                    debug!("Loaded {} saved options for {}", saved.len(), user_id);
                    self.store.prime_cache(saved);
                }
                Err(e) => warn!("Could not load saved options for {}: {}", user_id, e),
            }
        }

        if self.gamemodes.is_empty() {
            warn!("Room has no game modes registered");
            return;
        }

        let selector = GameOption::new(
            category::NONE,
            option_name::GAMEMODE,
            OptionValue::enumeration(self.gamemode_names(), 0),
            priority::A,
        );
        let selector = self.store.insert_with_cache(selector).clone();
        let selected = selector
            .value
            .as_enum()
            .and_then(|value| value.selected_option())
            .map(str::to_string);
        transport.broadcast(vec![OptionOp::Set(selector)], None, &[]);

        let Some(name) = selected else {
            return;
        };
        match self.set_gamemode(&name, true, transport) {
            Ok(()) => {}
            Err(e @ OptionError::TransitionCycleExceeded { .. }) => warn!("{}", e),
            Err(e) => warn!("Could not activate game mode '{}': {}", name, e),
        }
    }

    /// Unregisters a connection, saving the cache if it created the room
    pub fn on_client_left(&mut self, client_id: u32) {
        let Some(creator) = self.creator.as_ref() else {
            return;
        };
        if creator.client_id != client_id {
            return;
        }

        if let Some(user_id) = &creator.user_id {
            match self.profiles.save_options(user_id, self.store.cache()) {
                Ok(()) => info!("Saved {} options for {}", self.store.cache().len(), user_id),
                Err(e) => warn!("Could not save options for {}: {}", user_id, e),
            }
        }
    }

    /// Handles a `SetOption` proposal from a connection
    ///
    /// Invalid proposals are logged and dropped without a reply. Returns the
    /// outcome of a proposal that reached the listeners.
    pub fn handle_set_option<T: Transport + ?Sized>(
        &mut self,
        origin: u32,
        key: &str,
        value: OptionValue,
        transport: &mut T,
    ) -> Option<ChangeOutcome> {
        let listeners = &self.listeners;
        let active = self.gamemodes.get(self.active);

        let result = validator::propose(
            &mut self.store,
            origin,
            key,
            value,
            transport,
            |change, options| {
                let vetoed = listeners
                    .iter()
                    .any(|listener| listener.on_option_changed(change, options) == Decision::Reject)
                    || active.map_or(false, |mode| {
                        mode.on_option_changed(change, options) == Decision::Reject
                    });
                if vetoed {
                    Decision::Reject
                } else {
                    Decision::Accept
                }
            },
        );

        match result {
            Ok(outcome) => {
                if let ChangeOutcome::Committed(change) = &outcome {
                    self.after_change(change, transport);
                }
                Some(outcome)
            }
            Err(e) => {
                warn!("Dropped proposal from client {}: {}", origin, e);
                None
            }
        }
    }

    /// Changes an option on behalf of the server
    ///
    /// The change skips the listeners and is broadcast to every connection.
    /// Returns the replaced value.
    pub fn set_option<T: Transport + ?Sized>(
        &mut self,
        key: &str,
        value: OptionValue,
        validate: bool,
        transport: &mut T,
    ) -> Result<OptionValue, OptionError> {
        let old = self.store.set_value(key, value, validate)?;
        let committed = self
            .store
            .get(key)
            .cloned()
            .ok_or_else(|| OptionError::UnknownKey(key.to_string()))?;

        let change = OptionChange {
            key: key.to_string(),
            old: old.clone(),
            new: committed.value.clone(),
            origin: None,
        };
        transport.broadcast(vec![OptionOp::Set(committed)], None, &[]);
        self.after_change(&change, transport);

        Ok(old)
    }

    /// Activates the game mode called `name`
    ///
    /// The game mode selector follows the new mode. With `do_transition` the
    /// option set is rebuilt for it straight away.
    pub fn set_gamemode<T: Transport + ?Sized>(
        &mut self,
        name: &str,
        do_transition: bool,
        transport: &mut T,
    ) -> Result<(), OptionError> {
        let index = self
            .gamemodes
            .iter()
            .position(|mode| mode.name() == name)
            .ok_or_else(|| OptionError::UnknownGamemode(name.to_string()))?;
        self.active = index;
        info!("Active game mode is now '{}'", name);

        let selected = self
            .store
            .value(option_name::GAMEMODE)
            .and_then(OptionValue::as_enum)
            .map(|value| value.selected_idx);
        if selected.is_some() && selected != Some(index as i32) {
            let selector = OptionValue::enumeration(self.gamemode_names(), index as i32);
            self.store.set_value(option_name::GAMEMODE, selector, true)?;
            if let Some(selector) = self.store.get(option_name::GAMEMODE) {
                transport.broadcast(vec![OptionOp::Set(selector.clone())], None, &[]);
            }
        }

        if do_transition {
            self.do_transition(transport)?;
        }
        Ok(())
    }

    /// Rebuilds the option set for the active game mode
    ///
    /// Typed settings are refreshed even when the transition gives up, since
    /// the store keeps the last applied pass.
    pub fn do_transition<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<u32, OptionError> {
        let Some(mode) = self.gamemodes.get(self.active) else {
            return Ok(0);
        };

        let result = schema::transition(
            &mut self.store,
            mode.as_ref(),
            transport,
            self.config.chunk_size,
            self.config.max_transition_iterations,
        );
        self.settings = RoomSettings::from_store(&self.store);
        result
    }

    /// Sends every current option to `clients`. Returns the number of chunks.
    pub fn sync_for<T: Transport + ?Sized>(&self, clients: &[u32], transport: &mut T) -> usize {
        broadcast_chunked(
            transport,
            &self.store.resync_ops(),
            self.config.chunk_size,
            Some(clients),
            &[],
        )
    }

    fn after_change<T: Transport + ?Sized>(&mut self, change: &OptionChange, transport: &mut T) {
        if change.key == option_name::GAMEMODE {
            let selected = change
                .new
                .as_enum()
                .and_then(|value| value.selected_option())
                .map(str::to_string);
            if let Some(name) = selected {
                if self.active_gamemode() != Some(name.as_str()) {
                    if let Err(e) = self.set_gamemode(&name, false, transport) {
                        warn!("Could not switch game mode to '{}': {}", name, e);
                    }
                }
            }
        }

        if let Err(e) = self.do_transition(transport) {
            warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamemode::{ENGINEER_PROBABILITY, ENGINEER_USES};
    use crate::profile::{FileProfileStore, MemoryProfileStore};
    use crate::schema::Contributor;
    use crate::transport::MemoryTransport;
    use shared::EnumValue;

    fn room() -> Room {
        Room::with_builtin_gamemodes(RoomConfig::default(), Box::new(MemoryProfileStore::new()))
    }

    fn select(idx: i32) -> OptionValue {
        OptionValue::Enum(EnumValue {
            options: vec![],
            selected_idx: idx,
        })
    }

    fn tasks(value: f32) -> OptionValue {
        OptionValue::number(value, 1.0, 0.0, 5.0, false, "")
    }

    #[test]
    fn test_first_join_initializes_room() {
        let mut room = room();
        let mut transport = MemoryTransport::new();

        room.on_client_joined(1, None, &mut transport);

        assert_eq!(room.creator(), Some(1));
        assert_eq!(room.active_gamemode(), Some("Classic"));
        assert_eq!(room.store().len(), 20);
        assert_eq!(room.settings(), &RoomSettings::from_store(room.store()));
        assert_eq!(room.settings().gamemode.as_deref(), Some("Classic"));

        let ops = transport.ops_for(1);
        assert_eq!(ops[0].key(), option_name::GAMEMODE);
        assert_eq!(ops.len(), 20);
    }

    struct Flipper;

    impl Contributor for Flipper {
        fn name(&self) -> &str {
            "flipper"
        }

        fn partial_schema(&self, options: &OptionStore) -> Vec<(String, OptionValue)> {
            let key = if options.contains("Flip A") { "Flip B" } else { "Flip A" };
            vec![(key.to_string(), OptionValue::boolean(true))]
        }
    }

    struct Restless {
        contributors: Vec<Box<dyn Contributor>>,
    }

    impl Gamemode for Restless {
        fn name(&self) -> &str {
            "Restless"
        }

        fn base_schema(&self) -> Vec<GameOption> {
            Vec::new()
        }

        fn contributors(&self) -> &[Box<dyn Contributor>] {
            &self.contributors
        }
    }

    #[test]
    fn test_first_join_activates_mode_that_never_settles() {
        let mode = Restless {
            contributors: vec![Box::new(Flipper)],
        };
        let mut room = Room::new(
            RoomConfig::default(),
            vec![Box::new(mode)],
            Box::new(MemoryProfileStore::new()),
        );
        let mut transport = MemoryTransport::new();

        room.on_client_joined(1, None, &mut transport);

        assert_eq!(room.active_gamemode(), Some("Restless"));
        assert_eq!(room.settings().gamemode.as_deref(), Some("Restless"));
        // selector plus five applied passes
        assert_eq!(transport.deliveries.len(), 6);
        assert_eq!(room.store().len(), 2);
        assert_ne!(room.store().contains("Flip A"), room.store().contains("Flip B"));
    }

    #[test]
    fn test_room_without_gamemodes_creates_no_selector() {
        let mut room = Room::new(
            RoomConfig::default(),
            Vec::new(),
            Box::new(MemoryProfileStore::new()),
        );
        let mut transport = MemoryTransport::new();

        room.on_client_joined(1, None, &mut transport);

        assert_eq!(room.creator(), Some(1));
        assert!(room.store().get(option_name::GAMEMODE).is_none());
        assert!(room.store().is_empty());
        assert!(transport.deliveries.is_empty());
        assert_eq!(room.active_gamemode(), None);
    }

    #[test]
    fn test_later_join_gets_resync() {
        let mut room = room();
        let mut transport = MemoryTransport::new();
        room.on_client_joined(1, None, &mut transport);
        transport.clear();

        room.on_client_joined(2, None, &mut transport);

        assert_eq!(room.creator(), Some(1));
        assert_eq!(transport.deliveries.len(), 3);
        assert!(transport.ops_for(1).is_empty());
        let keys: Vec<String> = transport
            .ops_for(2)
            .iter()
            .map(|op| op.key().to_string())
            .collect();
        assert_eq!(keys.len(), 20);
        assert_eq!(keys[0], option_name::GAMEMODE);
    }

    #[test]
    fn test_task_guard_reverts_last_task_removal() {
        let mut room = room();
        let mut transport = MemoryTransport::new();
        room.on_client_joined(1, None, &mut transport);
        room.set_option(option_name::COMMON_TASKS, tasks(0.0), true, &mut transport)
            .unwrap();
        room.set_option(option_name::LONG_TASKS, tasks(0.0), true, &mut transport)
            .unwrap();
        transport.clear();

        let outcome =
            room.handle_set_option(2, option_name::SHORT_TASKS, tasks(0.0), &mut transport);

        assert!(matches!(outcome, Some(ChangeOutcome::Reverted(_))));
        assert_eq!(room.store().number(option_name::SHORT_TASKS), Some(3.0));
        assert_eq!(room.settings().short_tasks, 3);
        assert_eq!(transport.deliveries.len(), 1);
        assert_eq!(transport.ops_for(2).len(), 1);
        assert!(transport.ops_for(1).is_empty());
    }

    #[test]
    fn test_gamemode_selection_switches_schema() {
        let mut room = room();
        let mut transport = MemoryTransport::new();
        room.on_client_joined(1, None, &mut transport);

        let outcome = room.handle_set_option(1, option_name::GAMEMODE, select(1), &mut transport);

        assert!(matches!(outcome, Some(ChangeOutcome::Committed(_))));
        assert_eq!(room.active_gamemode(), Some("Roles"));
        assert!(room.store().contains(ENGINEER_PROBABILITY));
        assert!(!room.store().contains(ENGINEER_USES));

        room.handle_set_option(
            1,
            ENGINEER_PROBABILITY,
            OptionValue::number(40.0, 10.0, 0.0, 100.0, false, ""),
            &mut transport,
        );
        assert!(room.store().contains(ENGINEER_USES));

        room.set_gamemode("Classic", true, &mut transport).unwrap();
        assert_eq!(room.store().selected(option_name::GAMEMODE), Some("Classic"));
        assert!(!room.store().contains(ENGINEER_PROBABILITY));
        assert!(!room.store().contains(ENGINEER_USES));
    }

    #[test]
    fn test_unknown_gamemode() {
        let mut room = room();
        let mut transport = MemoryTransport::new();
        assert_eq!(
            room.set_gamemode("Hide and Seek", true, &mut transport),
            Err(OptionError::UnknownGamemode("Hide and Seek".to_string()))
        );
    }

    #[test]
    fn test_invalid_proposal_is_dropped() {
        let mut room = room();
        let mut transport = MemoryTransport::new();
        room.on_client_joined(1, None, &mut transport);
        transport.clear();

        assert!(room
            .handle_set_option(1, "Nope", OptionValue::boolean(true), &mut transport)
            .is_none());
        assert!(room
            .handle_set_option(1, option_name::MAP, OptionValue::boolean(true), &mut transport)
            .is_none());
        assert!(transport.deliveries.is_empty());
    }

    struct NoFastGames;

    impl ChangeListener for NoFastGames {
        fn on_option_changed(&self, change: &OptionChange, _options: &OptionStore) -> Decision {
            let too_fast = change.key == option_name::PLAYER_SPEED
                && change.new.as_number().map_or(false, |number| number.value > 2.0);
            if too_fast {
                Decision::Reject
            } else {
                Decision::Accept
            }
        }
    }

    #[test]
    fn test_added_listener_can_veto() {
        let mut room = room();
        room.add_listener(Box::new(NoFastGames));
        let mut transport = MemoryTransport::new();
        room.on_client_joined(1, None, &mut transport);

        let speed = |value| OptionValue::number(value, 0.25, 0.25, 3.0, false, "");
        let outcome =
            room.handle_set_option(1, option_name::PLAYER_SPEED, speed(2.5), &mut transport);
        assert!(matches!(outcome, Some(ChangeOutcome::Reverted(_))));

        let outcome =
            room.handle_set_option(1, option_name::PLAYER_SPEED, speed(1.5), &mut transport);
        assert!(matches!(outcome, Some(ChangeOutcome::Committed(_))));
        assert_eq!(room.settings().player_speed, 1.5);
    }

    #[test]
    fn test_creator_preferences_persist() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = MemoryTransport::new();

        let mut first = Room::with_builtin_gamemodes(
            RoomConfig::default(),
            Box::new(FileProfileStore::new(dir.path()).unwrap()),
        );
        first.on_client_joined(1, Some("host"), &mut transport);
        first.handle_set_option(1, option_name::MAP, select(2), &mut transport);
        first.handle_set_option(1, option_name::GAMEMODE, select(1), &mut transport);
        first.on_client_left(1);

        let mut second = Room::with_builtin_gamemodes(
            RoomConfig::default(),
            Box::new(FileProfileStore::new(dir.path()).unwrap()),
        );
        second.on_client_joined(5, Some("host"), &mut transport);

        assert_eq!(second.store().selected(option_name::MAP), Some("Mira HQ"));
        assert_eq!(second.active_gamemode(), Some("Roles"));
        assert_eq!(second.settings().map, "Mira HQ");
    }

    #[test]
    fn test_non_creator_leaving_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut room = Room::with_builtin_gamemodes(
            RoomConfig::default(),
            Box::new(FileProfileStore::new(dir.path()).unwrap()),
        );
        let mut transport = MemoryTransport::new();
        room.on_client_joined(1, Some("host"), &mut transport);
        room.on_client_joined(2, Some("guest"), &mut transport);

        room.on_client_left(2);
        assert!(!dir.path().join("guest.bin").exists());
        assert!(!dir.path().join("host.bin").exists());

        room.on_client_left(1);
        assert!(dir.path().join("host.bin").exists());
    }
}
