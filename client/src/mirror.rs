//! Client-side mirror of the room's options
//!
//! The mirror applies the server's operations as they arrive. Operations are
//! idempotent, so duplicates from a resync or a retransmitted chunk leave the
//! mirror unchanged. Local proposals are applied optimistically and corrected
//! by the server if it clamps or rejects them.

use shared::{GameOption, OptionOp, OptionValue};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct OptionMirror {
    options: HashMap<String, GameOption>,
}

impl OptionMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, op: &OptionOp) {
        match op {
            OptionOp::Set(option) => {
                self.options.insert(option.key.clone(), option.clone());
            }
            OptionOp::Delete(key) => {
                self.options.remove(key);
            }
        }
    }

    pub fn apply_all(&mut self, ops: &[OptionOp]) {
        for op in ops {
            self.apply(op);
        }
    }

    pub fn get(&self, key: &str) -> Option<&GameOption> {
        self.options.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn options(&self) -> &HashMap<String, GameOption> {
        &self.options
    }

    /// All options in display order
    pub fn sorted(&self) -> Vec<&GameOption> {
        let mut sorted: Vec<&GameOption> = self.options.values().collect();
        sorted.sort_by(|a, b| a.display_order(b));
        sorted
    }

    /// Applies a local change optimistically
    ///
    /// Returns the value to send to the server, or `None` when the key is
    /// unknown or the value has the wrong kind.
    pub fn propose(&mut self, key: &str, value: &OptionValue) -> Option<OptionValue> {
        let option = self.options.get_mut(key)?;
        let conformed = value.conform_to(&option.value)?;
        option.value = conformed.clone();
        Some(conformed)
    }

    /// One line per option, grouped under category headings
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut current_category: Option<&str> = None;

        for option in self.sorted() {
            if current_category != Some(option.category.as_str()) {
                current_category = Some(option.category.as_str());
                if !option.category.is_empty() {
                    out.push_str(&format!("[{}]\n", option.category));
                }
            }
            out.push_str(&format!("  {}: {}\n", option.key, describe(&option.value)));
        }

        out
    }
}

/// Human readable form of a value
pub fn describe(value: &OptionValue) -> String {
    match value {
        OptionValue::Boolean(value) => {
            if value.enabled {
                "On".to_string()
            } else {
                "Off".to_string()
            }
        }
        OptionValue::Number(number) => {
            if number.zero_is_infinity && number.value == 0.0 {
                return "∞".to_string();
            }
            let value = number.value.to_string();
            if number.suffix.is_empty() {
                value
            } else {
                number.suffix.replace("{0}", &value)
            }
        }
        OptionValue::Enum(value) => value.selected_option().unwrap_or("?").to_string(),
    }
}

/// Parses user input into a value of the same kind as `existing`
///
/// Booleans accept on/off, true/false and yes/no. Enums accept a choice name
/// (case-insensitive) or its index.
pub fn parse_value(existing: &OptionValue, input: &str) -> Option<OptionValue> {
    let input = input.trim();

    match existing {
        OptionValue::Boolean(_) => {
            let enabled = match input.to_ascii_lowercase().as_str() {
                "on" | "true" | "yes" | "1" => true,
                "off" | "false" | "no" | "0" => false,
                _ => return None,
            };
            Some(OptionValue::boolean(enabled))
        }
        OptionValue::Number(number) => {
            let value: f32 = input.parse().ok()?;
            let mut proposed = number.clone();
            proposed.value = value;
            Some(OptionValue::Number(proposed))
        }
        OptionValue::Enum(choices) => {
            let selected_idx = choices
                .options
                .iter()
                .position(|option| option.eq_ignore_ascii_case(input))
                .map(|idx| idx as i32)
                .or_else(|| input.parse().ok())?;
            let mut proposed = choices.clone();
            proposed.selected_idx = selected_idx;
            Some(OptionValue::Enum(proposed))
        }
    }
}

/// Splits a `KEY=VALUE` command line assignment
pub fn parse_assignment(input: &str) -> Result<(String, String), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", input))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing option name in '{}'", input));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
