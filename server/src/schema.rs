//! Schema building and the transition loop
//!
//! The option schema of a room is computed, not declared: the active game mode
//! supplies a base set of options and each of its contributors (roles, rules)
//! may add more depending on the current option values. Because contributors
//! react to the store, applying one schema can change the next one. A
//! transition therefore rebuilds and diffs repeatedly until nothing changes,
//! giving up after a fixed number of passes so that two contributors fighting
//! over the same key can never stall the room.

use crate::error::OptionError;
use crate::option_store::OptionStore;
use crate::transport::{broadcast_chunked, Transport};
use crate::validator::{Decision, OptionChange};
use log::{debug, warn};
use shared::{category, priority, GameOption, OptionValue};
use std::collections::HashMap;

/// Priority distance between consecutive contributors
pub const CONTRIBUTOR_PRIORITY_STRIDE: u32 = 100;

/// A component that adds options to the schema of its game mode
pub trait Contributor: Send + Sync {
    fn name(&self) -> &str;

    fn category(&self) -> &str {
        category::CONFIG
    }

    /// Options this contributor exposes given the current option values, in
    /// display order
    fn partial_schema(&self, options: &OptionStore) -> Vec<(String, OptionValue)>;
}

/// A selectable game mode
pub trait Gamemode: Send + Sync {
    fn name(&self) -> &str;

    /// Options that exist regardless of contributors, with explicit priorities
    fn base_schema(&self) -> Vec<GameOption>;

    fn contributors(&self) -> &[Box<dyn Contributor>] {
        &[]
    }

    /// Veto hook for proposed changes while this game mode is active
    fn on_option_changed(&self, _change: &OptionChange, _options: &OptionStore) -> Decision {
        Decision::Accept
    }
}

/// Builds the full candidate option set for `gamemode` against `store`
pub fn build_schema(gamemode: &dyn Gamemode, store: &OptionStore) -> HashMap<String, GameOption> {
    let mut candidate: HashMap<String, GameOption> = gamemode
        .base_schema()
        .into_iter()
        .map(|option| (option.key.clone(), option))
        .collect();
    let mut owners: HashMap<String, &str> = HashMap::new();

    for (i, contributor) in gamemode.contributors().iter().enumerate() {
        for (j, (key, value)) in contributor.partial_schema(store).into_iter().enumerate() {
            if let Some(previous) = owners.insert(key.clone(), contributor.name()) {
                if previous != contributor.name() {
                    warn!(
                        "Contributors '{}' and '{}' both define option '{}'",
                        previous,
                        contributor.name(),
                        key
                    );
                }
            }

            let priority =
                priority::H + i as u32 * CONTRIBUTOR_PRIORITY_STRIDE + j as u32;
            let option = GameOption::new(contributor.category(), key.clone(), value, priority);
            candidate.insert(key, option);
        }
    }

    for option in candidate.values_mut() {
        store.overlay_cache(option);
    }

    candidate
}

/// Reconciles `store` with the schema of `gamemode`
///
/// Every pass that produces a non-empty diff is applied and broadcast before
/// the next pass is built. Returns the number of applied passes, or
/// `TransitionCycleExceeded` after `max_iterations` applied passes; in that
/// case the store keeps the last applied state.
pub fn transition<T: Transport + ?Sized>(
    store: &mut OptionStore,
    gamemode: &dyn Gamemode,
    transport: &mut T,
    chunk_size: usize,
    max_iterations: u32,
) -> Result<u32, OptionError> {
    let mut applied = 0;

    while applied < max_iterations {
        let candidate = build_schema(gamemode, store);
        let ops = store.diff_against(&candidate);
        if ops.is_empty() {
            return Ok(applied);
        }

        store.apply_all(&ops);
        let chunks = broadcast_chunked(transport, &ops, chunk_size, None, &[]);
        applied += 1;

        debug!(
            "Transition pass {} for '{}': {} ops in {} chunks",
            applied,
            gamemode.name(),
            ops.len(),
            chunks
        );
    }

    Err(OptionError::TransitionCycleExceeded {
        iterations: applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use shared::OptionOp;

    struct TestMode {
        base: Vec<GameOption>,
        contributors: Vec<Box<dyn Contributor>>,
    }

    impl Gamemode for TestMode {
        fn name(&self) -> &str {
            "Test"
        }

        fn base_schema(&self) -> Vec<GameOption> {
            self.base.clone()
        }

        fn contributors(&self) -> &[Box<dyn Contributor>] {
            &self.contributors
        }
    }

    /// Exposes its options only while `gate` is a number above zero
    struct Gated {
        gate: &'static str,
        keys: Vec<&'static str>,
    }

    impl Contributor for Gated {
        fn name(&self) -> &str {
            self.gate
        }

        fn partial_schema(&self, options: &OptionStore) -> Vec<(String, OptionValue)> {
            if options.number(self.gate).unwrap_or(0.0) > 0.0 {
                self.keys
                    .iter()
                    .map(|key| (key.to_string(), OptionValue::boolean(false)))
                    .collect()
            } else {
                Vec::new()
            }
        }
    }

    /// Always claims "Shared" under its own category
    struct Claimer {
        name: &'static str,
        category: &'static str,
        only_when_held_by: Option<&'static str>,
    }

    impl Contributor for Claimer {
        fn name(&self) -> &str {
            self.name
        }

        fn category(&self) -> &str {
            self.category
        }

        fn partial_schema(&self, options: &OptionStore) -> Vec<(String, OptionValue)> {
            let held_by = options.get("Shared").map(|option| option.category.as_str());
            match self.only_when_held_by {
                Some(category) if held_by != Some(category) => Vec::new(),
                _ => vec![("Shared".to_string(), OptionValue::boolean(true))],
            }
        }
    }

    fn probability(key: &str, value: f32, priority: u32) -> GameOption {
        GameOption::new(
            category::CREWMATE_ROLES,
            key,
            OptionValue::number(value, 10.0, 0.0, 100.0, false, "{0}%"),
            priority,
        )
    }

    #[test]
    fn test_contributor_priorities() {
        let mode = TestMode {
            base: vec![],
            contributors: vec![
                Box::new(Gated {
                    gate: "A",
                    keys: vec!["A1", "A2"],
                }),
                Box::new(Gated {
                    gate: "B",
                    keys: vec!["B1"],
                }),
            ],
        };
        let mut store = OptionStore::new();
        store.apply(&OptionOp::Set(probability("A", 10.0, 1)));
        store.apply(&OptionOp::Set(probability("B", 10.0, 2)));

        let schema = build_schema(&mode, &store);
        assert_eq!(schema["A1"].priority, priority::H);
        assert_eq!(schema["A2"].priority, priority::H + 1);
        assert_eq!(schema["B1"].priority, priority::H + 100);
        assert_eq!(schema["B1"].category, category::CONFIG);
    }

    #[test]
    fn test_transition_reaches_fixed_point() {
        let mode = TestMode {
            base: vec![probability("Engineer Probability", 50.0, priority::D)],
            contributors: vec![Box::new(Gated {
                gate: "Engineer Probability",
                keys: vec!["Engineer Uses"],
            })],
        };
        let mut store = OptionStore::new();
        let mut transport = MemoryTransport::new();

        let passes = transition(&mut store, &mode, &mut transport, 8, 5).unwrap();

        assert_eq!(passes, 2);
        assert!(store.contains("Engineer Probability"));
        assert!(store.contains("Engineer Uses"));
        assert_eq!(transport.deliveries.len(), 2);
    }

    #[test]
    fn test_transition_without_changes_is_silent() {
        let mode = TestMode {
            base: vec![probability("P", 0.0, 1)],
            contributors: vec![],
        };
        let mut store = OptionStore::new();
        let mut transport = MemoryTransport::new();

        transition(&mut store, &mode, &mut transport, 8, 5).unwrap();
        transport.clear();

        assert_eq!(transition(&mut store, &mode, &mut transport, 8, 5), Ok(0));
        assert!(transport.deliveries.is_empty());
    }

    #[test]
    fn test_transition_removes_gated_options() {
        let mode = TestMode {
            base: vec![probability("Gate", 0.0, 1)],
            contributors: vec![Box::new(Gated {
                gate: "Gate",
                keys: vec!["Child"],
            })],
        };
        let mut store = OptionStore::new();
        store.apply(&OptionOp::Set(probability("Gate", 30.0, 1)));
        store.apply(&OptionOp::Set(GameOption::new(
            category::CONFIG,
            "Child",
            OptionValue::boolean(false),
            priority::H,
        )));
        let mut transport = MemoryTransport::new();

        transition(&mut store, &mode, &mut transport, 8, 5).unwrap();

        // the cached gate value (30) is restored, so the child survives
        assert!(store.contains("Child"));

        store
            .set_value("Gate", OptionValue::number(0.0, 10.0, 0.0, 100.0, false, ""), true)
            .unwrap();
        transition(&mut store, &mode, &mut transport, 8, 5).unwrap();
        assert!(!store.contains("Child"));
        assert!(store.cached("Config.Child").is_some());
    }

    #[test]
    fn test_transition_gives_up_on_oscillation() {
        let mode = TestMode {
            base: vec![],
            contributors: vec![
                Box::new(Claimer {
                    name: "alpha",
                    category: "Alpha",
                    only_when_held_by: None,
                }),
                Box::new(Claimer {
                    name: "beta",
                    category: "Beta",
                    only_when_held_by: Some("Alpha"),
                }),
            ],
        };
        let mut store = OptionStore::new();
        let mut transport = MemoryTransport::new();

        let result = transition(&mut store, &mode, &mut transport, 8, 5);

        assert_eq!(
            result,
            Err(OptionError::TransitionCycleExceeded { iterations: 5 })
        );
        assert_eq!(transport.deliveries.len(), 5);
        assert_eq!(store.len(), 1);
        let shared = store.get("Shared").unwrap();
        assert_eq!(shared.category, "Alpha");
        assert!(store.cached("Alpha.Shared").is_some());
        assert!(store.cached("Beta.Shared").is_some());
    }
}
