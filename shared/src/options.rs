//! Typed option values and the records that carry them over the wire
//!
//! An option is a named, server-authoritative configuration value. Values are
//! one of three kinds (boolean toggle, bounded number, single-choice enum) and
//! every mutation keeps them inside their own bounds, so a record received from
//! the network can always be displayed without further checks.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Display categories used by the built-in schema
pub mod category {
    pub const NONE: &str = "";
    pub const MEETINGS: &str = "Meeting Settings";
    pub const ROLES: &str = "Role Settings";
    pub const TASKS: &str = "Task Settings";
    pub const CREWMATE_ROLES: &str = "Crewmate Roles";
    pub const NEUTRAL_ROLES: &str = "Neutral Roles";
    pub const IMPOSTOR_ROLES: &str = "Impostor Roles";
    pub const CONFIG: &str = "Config";
}

/// Keys of the options every room starts with
pub mod option_name {
    pub const GAMEMODE: &str = "Gamemode";
    pub const MAP: &str = "Map";
    pub const IMPOSTOR_COUNT: &str = "Impostor Count";
    pub const MAX_PLAYER_COUNT: &str = "Max Player Count";
    pub const EMERGENCY_MEETINGS: &str = "Emergency Meetings";
    pub const EMERGENCY_COOLDOWN: &str = "Emergency Cooldown";
    pub const DISCUSSION_TIME: &str = "Discussion Time";
    pub const VOTING_TIME: &str = "Voting Time";
    pub const ANONYMOUS_VOTES: &str = "Anonymous Votes";
    pub const CONFIRM_EJECTS: &str = "Confirm Ejects";
    pub const PLAYER_SPEED: &str = "Player Speed";
    pub const CREWMATE_VISION: &str = "Crewmate Vision";
    pub const IMPOSTOR_VISION: &str = "Impostor Vision";
    pub const IMPOSTOR_KILL_COOLDOWN: &str = "Impostor Kill Cooldown";
    pub const IMPOSTOR_KILL_DISTANCE: &str = "Impostor Kill Distance";
    pub const COMMON_TASKS: &str = "Common Tasks";
    pub const LONG_TASKS: &str = "Long Tasks";
    pub const SHORT_TASKS: &str = "Short Tasks";
    pub const VISUAL_TASKS: &str = "Visual Tasks";
    pub const TASK_BAR_UPDATES: &str = "Task Bar Updates";
}

/// Priority bands. Options sort by priority for display and diffing; schema
/// contributors are placed above `H`.
pub mod priority {
    pub const A: u32 = 0;
    pub const B: u32 = 1000;
    pub const C: u32 = 2000;
    pub const D: u32 = 3000;
    pub const E: u32 = 4000;
    pub const F: u32 = 5000;
    pub const G: u32 = 6000;
    pub const H: u32 = 7000;
}

/// The kind of an [`OptionValue`], used in type-mismatch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionKind {
    Boolean,
    Number,
    Enum,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionKind::Boolean => "boolean",
            OptionKind::Number => "number",
            OptionKind::Enum => "enum",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanValue {
    pub enabled: bool,
}

/// A bounded number moved in `step` increments by client UIs
///
/// `suffix` is a display template where `{0}` is replaced by the value.
/// When `zero_is_infinity` is set, a value of zero is shown as unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberValue {
    pub value: f32,
    pub step: f32,
    pub lower: f32,
    pub upper: f32,
    pub zero_is_infinity: bool,
    pub suffix: String,
}

impl NumberValue {
    pub fn new(
        value: f32,
        step: f32,
        lower: f32,
        upper: f32,
        zero_is_infinity: bool,
        suffix: impl Into<String>,
    ) -> Self {
        let mut number = Self {
            value,
            step,
            lower,
            upper,
            zero_is_infinity,
            suffix: suffix.into(),
        };
        number.repair_bounds();
        number.value = number.clamp(value);
        number
    }

    /// Swaps inverted bounds and replaces a step that is not positive with 1
    pub fn repair_bounds(&mut self) {
        if self.lower > self.upper {
            std::mem::swap(&mut self.lower, &mut self.upper);
        }
        if self.step.is_nan() || self.step <= 0.0 {
            self.step = 1.0;
        }
    }

    /// Saturating clamp into `[lower, upper]`. NaN lands on the lower bound.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.lower;
        }
        value.max(self.lower).min(self.upper)
    }

    pub fn is_roughly_equal(&self, other: f32) -> bool {
        (self.value - other).abs() < 0.0001
    }
}

/// A single choice out of an ordered, non-empty list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub options: Vec<String>,
    pub selected_idx: i32,
}

impl EnumValue {
    pub fn new<S: Into<String>>(options: impl IntoIterator<Item = S>, selected_idx: i32) -> Self {
        let mut value = Self {
            options: options.into_iter().map(Into::into).collect(),
            selected_idx,
        };
        value.selected_idx = value.clamp(selected_idx);
        value
    }

    /// Saturating clamp into `[0, options.len() - 1]`
    pub fn clamp(&self, idx: i32) -> i32 {
        let last = (self.options.len() as i32 - 1).max(0);
        idx.clamp(0, last)
    }

    pub fn selected_option(&self) -> Option<&str> {
        usize::try_from(self.selected_idx)
            .ok()
            .and_then(|idx| self.options.get(idx))
            .map(String::as_str)
    }

    pub fn index_of(&self, option: &str) -> Option<i32> {
        self.options
            .iter()
            .position(|candidate| candidate == option)
            .map(|idx| idx as i32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionValue {
    Boolean(BooleanValue),
    Number(NumberValue),
    Enum(EnumValue),
}

impl OptionValue {
    pub fn boolean(enabled: bool) -> Self {
        OptionValue::Boolean(BooleanValue { enabled })
    }

    pub fn number(
        value: f32,
        step: f32,
        lower: f32,
        upper: f32,
        zero_is_infinity: bool,
        suffix: impl Into<String>,
    ) -> Self {
        OptionValue::Number(NumberValue::new(
            value,
            step,
            lower,
            upper,
            zero_is_infinity,
            suffix,
        ))
    }

    pub fn enumeration<S: Into<String>>(
        options: impl IntoIterator<Item = S>,
        selected_idx: i32,
    ) -> Self {
        OptionValue::Enum(EnumValue::new(options, selected_idx))
    }

    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Boolean(_) => OptionKind::Boolean,
            OptionValue::Number(_) => OptionKind::Number,
            OptionValue::Enum(_) => OptionKind::Enum,
        }
    }

    /// Returns this value clamped into its own bounds
    pub fn normalized(&self) -> OptionValue {
        match self {
            OptionValue::Boolean(value) => OptionValue::Boolean(value.clone()),
            OptionValue::Number(number) => {
                let mut number = number.clone();
                number.repair_bounds();
                number.value = number.clamp(number.value);
                OptionValue::Number(number)
            }
            OptionValue::Enum(value) => {
                let mut value = value.clone();
                value.selected_idx = value.clamp(value.selected_idx);
                OptionValue::Enum(value)
            }
        }
    }

    /// Re-expresses this value under the schema of `existing`
    ///
    /// The payload (enabled flag, number, selected index) comes from `self`;
    /// bounds, step, suffix and enum choices come from `existing`, with the
    /// payload saturating-clamped into them. Returns `None` when the kinds
    /// differ.
    pub fn conform_to(&self, existing: &OptionValue) -> Option<OptionValue> {
        match (self, existing) {
            (OptionValue::Boolean(proposed), OptionValue::Boolean(_)) => {
                Some(OptionValue::Boolean(proposed.clone()))
            }
            (OptionValue::Number(proposed), OptionValue::Number(schema)) => {
                let mut number = schema.clone();
                number.value = schema.clamp(proposed.value);
                Some(OptionValue::Number(number))
            }
            (OptionValue::Enum(proposed), OptionValue::Enum(schema)) => {
                let mut value = schema.clone();
                value.selected_idx = schema.clamp(proposed.selected_idx);
                Some(OptionValue::Enum(value))
            }
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&NumberValue> {
        match self {
            OptionValue::Number(number) => Some(number),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            OptionValue::Enum(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            OptionValue::Boolean(value) => Some(value.enabled),
            _ => None,
        }
    }
}

/// A server-authoritative option as stored and synchronized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOption {
    pub category: String,
    pub key: String,
    pub value: OptionValue,
    pub priority: u32,
}

impl GameOption {
    pub fn new(
        category: impl Into<String>,
        key: impl Into<String>,
        value: OptionValue,
        priority: u32,
    ) -> Self {
        Self {
            category: category.into(),
            key: key.into(),
            value,
            priority,
        }
    }

    /// Cache path of this option: `category.key`
    pub fn path(&self) -> String {
        format!("{}.{}", self.category, self.key)
    }

    /// Total display order: priority first, key as tie-breaker
    pub fn display_order(&self, other: &GameOption) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.key.cmp(&other.key))
    }
}

/// A single change to a client's option view
///
/// Both variants are idempotent when replayed: setting the same record twice
/// leaves the same state, deleting an absent key does nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionOp {
    Set(GameOption),
    Delete(String),
}

impl OptionOp {
    pub fn key(&self) -> &str {
        match self {
            OptionOp::Set(option) => &option.key,
            OptionOp::Delete(key) => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn speed() -> OptionValue {
        OptionValue::number(1.25, 0.25, 0.25, 3.0, false, "{0}x")
    }

    #[test]
    fn test_number_clamps_on_construction() {
        let number = NumberValue::new(10.0, 1.0, 0.0, 5.0, false, "");
        assert_eq!(number.value, 5.0);

        let number = NumberValue::new(-3.0, 1.0, 0.0, 5.0, false, "");
        assert_eq!(number.value, 0.0);
    }

    #[test]
    fn test_number_repairs_inverted_bounds_and_step() {
        let number = NumberValue::new(-1.0, 0.0, 3.0, 0.25, false, "");
        assert_eq!(number.lower, 0.25);
        assert_eq!(number.upper, 3.0);
        assert_eq!(number.step, 1.0);
        assert_eq!(number.value, 0.25);

        let raw = OptionValue::Number(NumberValue {
            value: -1.0,
            step: -0.5,
            lower: 3.0,
            upper: 0.25,
            zero_is_infinity: false,
            suffix: String::new(),
        });
        let number = raw.normalized().as_number().unwrap().clone();
        assert!(number.lower <= number.value && number.value <= number.upper);
        assert!(number.step > 0.0);
    }

    #[test]
    fn test_number_clamp_nan_goes_to_lower() {
        let number = NumberValue::new(1.0, 0.25, 0.25, 3.0, false, "");
        assert_eq!(number.clamp(f32::NAN), 0.25);
        assert_eq!(number.clamp(f32::INFINITY), 3.0);
    }

    #[test]
    fn test_enum_clamps_both_ends() {
        let value = EnumValue::new(["a", "b", "c"], 7);
        assert_eq!(value.selected_idx, 2);
        assert_eq!(value.clamp(-4), 0);
        assert_eq!(value.selected_option(), Some("c"));
        assert_eq!(value.index_of("b"), Some(1));
        assert_eq!(value.index_of("z"), None);
    }

    #[test]
    fn test_conform_number_uses_existing_bounds() {
        let proposed = OptionValue::Number(NumberValue {
            value: 5.0,
            step: 1.0,
            lower: 0.0,
            upper: 100.0,
            zero_is_infinity: true,
            suffix: "hacked".to_string(),
        });

        let conformed = proposed.conform_to(&speed()).unwrap();
        let number = conformed.as_number().unwrap();
        assert_approx_eq!(number.value, 3.0, 0.0001);
        assert_eq!(number.upper, 3.0);
        assert_eq!(number.suffix, "{0}x");
        assert!(!number.zero_is_infinity);
    }

    #[test]
    fn test_conform_enum_keeps_schema_options() {
        let schema = OptionValue::enumeration(["The Skeld", "Polus", "Mira HQ"], 0);
        let proposed = OptionValue::enumeration(["x", "y", "z", "w", "v"], 4);

        let conformed = proposed.conform_to(&schema).unwrap();
        let value = conformed.as_enum().unwrap();
        assert_eq!(value.selected_idx, 2);
        assert_eq!(value.selected_option(), Some("Mira HQ"));
    }

    #[test]
    fn test_conform_rejects_other_kinds() {
        assert!(OptionValue::boolean(true).conform_to(&speed()).is_none());
        assert!(speed()
            .conform_to(&OptionValue::enumeration(["a"], 0))
            .is_none());
    }

    #[test]
    fn test_values_of_different_kinds_never_equal() {
        assert_ne!(OptionValue::boolean(false), speed());
        assert_eq!(speed(), speed());
    }

    #[test]
    fn test_option_path_and_order() {
        let a = GameOption::new(category::TASKS, "Long Tasks", speed(), priority::C + 3);
        let b = GameOption::new(category::TASKS, "Common Tasks", speed(), priority::C + 3);
        let c = GameOption::new(category::NONE, "Map", speed(), priority::A);

        assert_eq!(a.path(), "Task Settings.Long Tasks");
        assert_eq!(c.path(), ".Map");
        assert_eq!(a.display_order(&b), Ordering::Greater);
        assert_eq!(c.display_order(&a), Ordering::Less);
    }

    #[test]
    fn test_is_roughly_equal() {
        let number = NumberValue::new(0.0, 1.0, 0.0, 3.0, false, "");
        assert!(number.is_roughly_equal(0.00001));
        assert!(!number.is_roughly_equal(1.0));
    }
}
