//! Typed view of the room's standard options
//!
//! Game logic reads these instead of looking options up by key. Options that
//! are missing or of the wrong kind fall back to the defaults of the built-in
//! schema.

use crate::option_store::OptionStore;
use serde::{Deserialize, Serialize};
use shared::option_name;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub gamemode: Option<String>,
    pub map: String,
    pub impostor_count: u32,
    pub max_players: u32,
    pub player_speed: f32,
    pub anonymous_votes: bool,
    pub confirm_ejects: bool,
    pub discussion_time: f32,
    pub voting_time: f32,
    pub emergency_cooldown: f32,
    pub emergency_meetings: u32,
    pub visual_tasks: bool,
    pub task_bar_updates: String,
    pub common_tasks: u32,
    pub long_tasks: u32,
    pub short_tasks: u32,
    pub crewmate_vision: f32,
    pub impostor_vision: f32,
    pub kill_cooldown: f32,
    pub kill_distance: String,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            gamemode: None,
            map: "The Skeld".to_string(),
            impostor_count: 2,
            max_players: 15,
            player_speed: 1.25,
            anonymous_votes: false,
            confirm_ejects: false,
            discussion_time: 15.0,
            voting_time: 150.0,
            emergency_cooldown: 20.0,
            emergency_meetings: 1,
            visual_tasks: false,
            task_bar_updates: "Always".to_string(),
            common_tasks: 1,
            long_tasks: 2,
            short_tasks: 3,
            crewmate_vision: 0.75,
            impostor_vision: 0.75,
            kill_cooldown: 30.0,
            kill_distance: "Short".to_string(),
        }
    }
}

impl RoomSettings {
    pub fn from_store(store: &OptionStore) -> Self {
        let defaults = Self::default();
        let number = |key: &str, default: f32| store.number(key).unwrap_or(default);
        let count = |key: &str, default: u32| {
            store
                .number(key)
                .map(|value| value.round().max(0.0) as u32)
                .unwrap_or(default)
        };
        let enabled = |key: &str, default: bool| store.enabled(key).unwrap_or(default);
        let selected = |key: &str, default: String| {
            store.selected(key).map(str::to_string).unwrap_or(default)
        };

        Self {
            gamemode: store.selected(option_name::GAMEMODE).map(str::to_string),
            map: selected(option_name::MAP, defaults.map),
            impostor_count: count(option_name::IMPOSTOR_COUNT, defaults.impostor_count),
            max_players: count(option_name::MAX_PLAYER_COUNT, defaults.max_players),
            player_speed: number(option_name::PLAYER_SPEED, defaults.player_speed),
            anonymous_votes: enabled(option_name::ANONYMOUS_VOTES, defaults.anonymous_votes),
            confirm_ejects: enabled(option_name::CONFIRM_EJECTS, defaults.confirm_ejects),
            discussion_time: number(option_name::DISCUSSION_TIME, defaults.discussion_time),
            voting_time: number(option_name::VOTING_TIME, defaults.voting_time),
            emergency_cooldown: number(
                option_name::EMERGENCY_COOLDOWN,
                defaults.emergency_cooldown,
            ),
            emergency_meetings: count(
                option_name::EMERGENCY_MEETINGS,
                defaults.emergency_meetings,
            ),
            visual_tasks: enabled(option_name::VISUAL_TASKS, defaults.visual_tasks),
            task_bar_updates: selected(option_name::TASK_BAR_UPDATES, defaults.task_bar_updates),
            common_tasks: count(option_name::COMMON_TASKS, defaults.common_tasks),
            long_tasks: count(option_name::LONG_TASKS, defaults.long_tasks),
            short_tasks: count(option_name::SHORT_TASKS, defaults.short_tasks),
            crewmate_vision: number(option_name::CREWMATE_VISION, defaults.crewmate_vision),
            impostor_vision: number(option_name::IMPOSTOR_VISION, defaults.impostor_vision),
            kill_cooldown: number(option_name::IMPOSTOR_KILL_COOLDOWN, defaults.kill_cooldown),
            kill_distance: selected(option_name::IMPOSTOR_KILL_DISTANCE, defaults.kill_distance),
        }
    }
}
