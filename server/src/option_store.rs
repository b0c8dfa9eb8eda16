//! Authoritative option storage for a single room
//!
//! The store holds two maps:
//! - the live options, keyed by option key, replaced wholesale on every schema
//!   rebuild
//! - a cache of last-known values keyed by `category.key`, which outlives the
//!   records themselves so that a rebuilt schema (or a returning room creator)
//!   recovers previously chosen settings
//!
//! Cache entries are created when a key is first observed and updated on every
//! committed change. They are never removed implicitly.

use crate::error::OptionError;
use log::debug;
use shared::{option_name, GameOption, OptionOp, OptionValue};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct OptionStore {
    options: HashMap<String, GameOption>,
    cache: HashMap<String, OptionValue>,
}

impl OptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&GameOption> {
        self.options.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn value(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key).map(|option| &option.value)
    }

    pub fn number(&self, key: &str) -> Option<f32> {
        self.value(key)
            .and_then(OptionValue::as_number)
            .map(|number| number.value)
    }

    pub fn enabled(&self, key: &str) -> Option<bool> {
        self.value(key).and_then(OptionValue::as_boolean)
    }

    pub fn selected(&self, key: &str) -> Option<&str> {
        self.value(key)
            .and_then(OptionValue::as_enum)
            .and_then(|value| value.selected_option())
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

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn cache(&self) -> &HashMap<String, OptionValue> {
        &self.cache
    }

    pub fn cached(&self, path: &str) -> Option<&OptionValue> {
        self.cache.get(path)
    }

    /// Seeds the cache with previously saved values, normalizing each one
    pub fn prime_cache(&mut self, values: HashMap<String, OptionValue>) {
        for (path, value) in values {
            self.cache.insert(path, value.normalized());
        }
    }

    /// Replaces an option's value and records it in the cache
    ///
    /// With `validate` the new value must be of the same kind as the current
    /// one and is conformed to the current bounds. Without it the value is
    /// stored as given, clamped only into its own bounds. Returns the value
    /// that was replaced.
    pub fn set_value(
        &mut self,
        key: &str,
        value: OptionValue,
        validate: bool,
    ) -> Result<OptionValue, OptionError> {
        let option = self
            .options
            .get_mut(key)
            .ok_or_else(|| OptionError::UnknownKey(key.to_string()))?;

        let next = if validate {
            value
                .conform_to(&option.value)
                .ok_or_else(|| OptionError::TypeMismatch {
                    key: key.to_string(),
                    expected: option.value.kind(),
                    found: value.kind(),
                })?
        } else {
            value.normalized()
        };

        let old = std::mem::replace(&mut option.value, next);
        self.cache.insert(option.path(), option.value.clone());
        Ok(old)
    }

    /// Removes an option. Its cache entry is kept.
    pub fn delete(&mut self, key: &str) -> Option<GameOption> {
        self.options.remove(key)
    }

    /// Replaces a record's default with its cached value, if compatible
    pub fn overlay_cache(&self, option: &mut GameOption) {
        if let Some(cached) = self.cache.get(&option.path()) {
            if let Some(value) = cached.conform_to(&option.value) {
                option.value = value;
            }
        }
    }

    /// Inserts a record after overlaying its cached value
    pub fn insert_with_cache(&mut self, mut option: GameOption) -> &GameOption {
        self.overlay_cache(&mut option);
        self.observe(option.path(), &option.value);
        let key = option.key.clone();
        self.options.insert(key.clone(), option);
        &self.options[&key]
    }

    /// Operations that turn the live options into `candidate`
    ///
    /// Deletions come first in display order of the current options, followed
    /// by sets in display order of the candidate. The game mode selector is
    /// never deleted by a diff.
    pub fn diff_against(&self, candidate: &HashMap<String, GameOption>) -> Vec<OptionOp> {
        let mut ops = Vec::new();

        for option in self.sorted() {
            if option.key == option_name::GAMEMODE {
                continue;
            }
            if !candidate.contains_key(&option.key) {
                ops.push(OptionOp::Delete(option.key.clone()));
            }
        }

        let mut incoming: Vec<&GameOption> = candidate.values().collect();
        incoming.sort_by(|a, b| a.display_order(b));

        for option in incoming {
            if self.options.get(&option.key) == Some(option) {
                continue;
            }
            ops.push(OptionOp::Set(option.clone()));
        }

        ops
    }

    /// Applies one operation. Replaying an operation is a no-op.
    pub fn apply(&mut self, op: &OptionOp) {
        match op {
            OptionOp::Set(option) => {
                self.observe(option.path(), &option.value);
                self.options.insert(option.key.clone(), option.clone());
            }
            OptionOp::Delete(key) => {
                if self.options.remove(key).is_some() {
                    debug!("Deleted option '{}'", key);
                }
            }
        }
    }

    /// Seeds the cache entry for `path`, replacing one of another kind
    fn observe(&mut self, path: String, value: &OptionValue) {
        match self.cache.get_mut(&path) {
            Some(cached) if cached.kind() == value.kind() => {}
            Some(cached) => {
                debug!("Replacing cached {:?} for '{}'", cached.kind(), path);
                *cached = value.clone();
            }
            None => {
                self.cache.insert(path, value.clone());
            }
        }
    }

    pub fn apply_all(&mut self, ops: &[OptionOp]) {
        for op in ops {
            self.apply(op);
        }
    }

    /// Every option as a `Set`, in display order
    pub fn resync_ops(&self) -> Vec<OptionOp> {
        self.sorted()
            .into_iter()
            .map(|option| OptionOp::Set(option.clone()))
            .collect()
    }
}
