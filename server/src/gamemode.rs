//! Built-in game modes and their option contributors

use crate::option_store::OptionStore;
use crate::schema::{Contributor, Gamemode};
use shared::{category, option_name, priority, GameOption, OptionValue};

pub const MAPS: [&str; 5] = ["The Skeld", "Polus", "Mira HQ", "Airship", "Submerged"];
pub const KILL_DISTANCES: [&str; 4] = ["Really Short", "Short", "Medium", "Long"];
pub const TASK_BAR_MODES: [&str; 3] = ["Always", "Meetings", "Never"];

pub const ENGINEER_PROBABILITY: &str = "Engineer Probability";
pub const ENGINEER_USES: &str = "Engineer Uses";
pub const SHERIFF_PROBABILITY: &str = "Sheriff Probability";
pub const SHERIFF_KILL_COOLDOWN: &str = "Sheriff Kill Cooldown";
pub const JESTER_PROBABILITY: &str = "Jester Probability";

/// Options shared by every game mode
pub fn default_options() -> Vec<GameOption> {
    let number = OptionValue::number;

    vec![
        GameOption::new(
            category::NONE,
            option_name::MAP,
            OptionValue::enumeration(MAPS, 0),
            priority::A + 1,
        ),
        GameOption::new(
            category::NONE,
            option_name::IMPOSTOR_COUNT,
            number(2.0, 1.0, 1.0, 3.0, false, "{0} Impostors"),
            priority::A + 2,
        ),
        GameOption::new(
            category::NONE,
            option_name::MAX_PLAYER_COUNT,
            number(15.0, 1.0, 4.0, 15.0, false, "{0} Players"),
            priority::A + 3,
        ),
        GameOption::new(
            category::NONE,
            option_name::PLAYER_SPEED,
            number(1.25, 0.25, 0.25, 3.0, false, "{0}x"),
            priority::A + 4,
        ),
        GameOption::new(
            category::MEETINGS,
            option_name::ANONYMOUS_VOTES,
            OptionValue::boolean(false),
            priority::B,
        ),
        GameOption::new(
            category::MEETINGS,
            option_name::CONFIRM_EJECTS,
            OptionValue::boolean(false),
            priority::B + 1,
        ),
        GameOption::new(
            category::MEETINGS,
            option_name::DISCUSSION_TIME,
            number(15.0, 15.0, 0.0, 300.0, false, "{0}s"),
            priority::B + 2,
        ),
        GameOption::new(
            category::MEETINGS,
            option_name::VOTING_TIME,
            number(150.0, 30.0, 0.0, 300.0, true, "{0}s"),
            priority::B + 3,
        ),
        GameOption::new(
            category::MEETINGS,
            option_name::EMERGENCY_COOLDOWN,
            number(20.0, 5.0, 0.0, 60.0, false, "{0}s"),
            priority::B + 4,
        ),
        GameOption::new(
            category::MEETINGS,
            option_name::EMERGENCY_MEETINGS,
            number(1.0, 1.0, 0.0, 9.0, false, "{0} Buttons"),
            priority::B + 5,
        ),
        GameOption::new(
            category::TASKS,
            option_name::VISUAL_TASKS,
            OptionValue::boolean(false),
            priority::C,
        ),
        GameOption::new(
            category::TASKS,
            option_name::TASK_BAR_UPDATES,
            OptionValue::enumeration(TASK_BAR_MODES, 0),
            priority::C + 1,
        ),
        GameOption::new(
            category::TASKS,
            option_name::COMMON_TASKS,
            number(1.0, 1.0, 0.0, 2.0, false, "{0} tasks"),
            priority::C + 2,
        ),
        GameOption::new(
            category::TASKS,
            option_name::LONG_TASKS,
            number(2.0, 1.0, 0.0, 3.0, false, "{0} tasks"),
            priority::C + 3,
        ),
        GameOption::new(
            category::TASKS,
            option_name::SHORT_TASKS,
            number(3.0, 1.0, 0.0, 5.0, false, "{0} tasks"),
            priority::C + 4,
        ),
        GameOption::new(
            category::ROLES,
            option_name::CREWMATE_VISION,
            number(0.75, 0.25, 0.25, 3.0, false, "{0}x"),
            priority::D,
        ),
        GameOption::new(
            category::ROLES,
            option_name::IMPOSTOR_VISION,
            number(0.75, 0.25, 0.25, 3.0, false, "{0}x"),
            priority::D + 1,
        ),
        GameOption::new(
            category::ROLES,
            option_name::IMPOSTOR_KILL_COOLDOWN,
            number(30.0, 2.5, 5.0, 60.0, false, "{0}s"),
            priority::D + 2,
        ),
        GameOption::new(
            category::ROLES,
            option_name::IMPOSTOR_KILL_DISTANCE,
            OptionValue::enumeration(KILL_DISTANCES, 1),
            priority::D + 3,
        ),
    ]
}

fn probability(role_category: &str, key: &str, priority: u32) -> GameOption {
    GameOption::new(
        role_category,
        key,
        OptionValue::number(0.0, 10.0, 0.0, 100.0, false, "{0}%"),
        priority,
    )
}

/// The default schema with no role contributors
pub struct Classic;

impl Gamemode for Classic {
    fn name(&self) -> &str {
        "Classic"
    }

    fn base_schema(&self) -> Vec<GameOption> {
        default_options()
    }
}

/// Default schema plus role probabilities, with per-role options that only
/// appear while the role can be rolled
pub struct Roles {
    contributors: Vec<Box<dyn Contributor>>,
}

impl Roles {
    pub fn new() -> Self {
        Self {
            contributors: vec![Box::new(Engineer), Box::new(Sheriff), Box::new(Jester)],
        }
    }
}

impl Default for Roles {
    fn default() -> Self {
        Self::new()
    }
}

impl Gamemode for Roles {
    fn name(&self) -> &str {
        "Roles"
    }

    fn base_schema(&self) -> Vec<GameOption> {
        let mut options = default_options();
        options.push(probability(category::CREWMATE_ROLES, ENGINEER_PROBABILITY, priority::E));
        options.push(probability(category::CREWMATE_ROLES, SHERIFF_PROBABILITY, priority::E + 1));
        options.push(probability(category::NEUTRAL_ROLES, JESTER_PROBABILITY, priority::F));
        options
    }

    fn contributors(&self) -> &[Box<dyn Contributor>] {
        &self.contributors
    }
}

fn role_enabled(options: &OptionStore, probability_key: &str) -> bool {
    options.number(probability_key).unwrap_or(0.0) > 0.0
}

pub struct Engineer;

impl Contributor for Engineer {
    fn name(&self) -> &str {
        "Engineer"
    }

    fn partial_schema(&self, options: &OptionStore) -> Vec<(String, OptionValue)> {
        if !role_enabled(options, ENGINEER_PROBABILITY) {
            return Vec::new();
        }
        vec![(
            ENGINEER_USES.to_string(),
            OptionValue::enumeration(["Per Round", "Per Match"], 0),
        )]
    }
}

pub struct Sheriff;

impl Contributor for Sheriff {
    fn name(&self) -> &str {
        "Sheriff"
    }

    fn partial_schema(&self, options: &OptionStore) -> Vec<(String, OptionValue)> {
        if !role_enabled(options, SHERIFF_PROBABILITY) {
            return Vec::new();
        }
        vec![(
            SHERIFF_KILL_COOLDOWN.to_string(),
            OptionValue::number(25.0, 2.5, 10.0, 60.0, false, "{0}s"),
        )]
    }
}

/// Has no options of its own
pub struct Jester;

impl Contributor for Jester {
    fn name(&self) -> &str {
        "Jester"
    }

    fn partial_schema(&self, _options: &OptionStore) -> Vec<(String, OptionValue)> {
        Vec::new()
    }
}

/// Every game mode shipped with the server, in selector order
pub fn builtin() -> Vec<Box<dyn Gamemode>> {
    vec![Box::new(Classic), Box::new(Roles::new())]
}
