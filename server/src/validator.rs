//! Validation of client-proposed option changes
//!
//! A proposal is applied to the store optimistically (type-checked and clamped),
//! then offered to the room's listeners. If every listener accepts, the change
//! is committed and broadcast to the other connections. If any listener
//! rejects it, the old value is restored and only the proposing connection is
//! told, since nobody else ever saw the optimistic value.

use crate::error::OptionError;
use crate::option_store::OptionStore;
use crate::transport::Transport;
use log::debug;
use shared::{option_name, OptionOp, OptionValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

/// A change that has been applied to the store but not yet confirmed
#[derive(Debug, Clone, PartialEq)]
pub struct OptionChange {
    pub key: String,
    pub old: OptionValue,
    pub new: OptionValue,
    /// Connection that proposed the change, `None` for server-side changes
    pub origin: Option<u32>,
}

/// Listener consulted before a proposed change is committed
pub trait ChangeListener: Send + Sync {
    fn on_option_changed(&self, change: &OptionChange, options: &OptionStore) -> Decision;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOutcome {
    Committed(OptionChange),
    Reverted(OptionChange),
}

impl ChangeOutcome {
    pub fn change(&self) -> &OptionChange {
        match self {
            ChangeOutcome::Committed(change) | ChangeOutcome::Reverted(change) => change,
        }
    }
}

/// Runs a proposal from connection `origin` through validation
///
/// Store errors are returned before anything is sent. `decide` is called once
/// with the optimistically applied change.
pub fn propose<T, F>(
    store: &mut OptionStore,
    origin: u32,
    key: &str,
    proposed: OptionValue,
    transport: &mut T,
    decide: F,
) -> Result<ChangeOutcome, OptionError>
where
    T: Transport + ?Sized,
    F: FnOnce(&OptionChange, &OptionStore) -> Decision,
{
    let old = store.set_value(key, proposed.clone(), true)?;
    let committed = store
        .get(key)
        .cloned()
        .ok_or_else(|| OptionError::UnknownKey(key.to_string()))?;

    let change = OptionChange {
        key: key.to_string(),
        old,
        new: committed.value.clone(),
        origin: Some(origin),
    };

    match decide(&change, &*store) {
        Decision::Accept => {
            // the proposer holds the unclamped value unless it survived as-is
            let exclude: &[u32] = if proposed == committed.value {
                std::slice::from_ref(&origin)
            } else {
                &[]
            };
            transport.broadcast(vec![OptionOp::Set(committed)], None, exclude);
            Ok(ChangeOutcome::Committed(change))
        }
        Decision::Reject => {
            store.set_value(key, change.old.clone(), false)?;
            if let Some(restored) = store.get(key) {
                transport.send(origin, vec![OptionOp::Set(restored.clone())]);
            }
            debug!("Reverted change to '{}' from client {}", key, origin);
            Ok(ChangeOutcome::Reverted(change))
        }
    }
}

/// Rejects changes that would leave a match without any tasks
#[derive(Debug, Default)]
pub struct TaskCountGuard;

impl ChangeListener for TaskCountGuard {
    fn on_option_changed(&self, change: &OptionChange, options: &OptionStore) -> Decision {
        let task_keys = [
            option_name::COMMON_TASKS,
            option_name::LONG_TASKS,
            option_name::SHORT_TASKS,
        ];
        if !task_keys.contains(&change.key.as_str()) {
            return Decision::Accept;
        }

        let all_zero = task_keys.iter().all(|key| {
            options
                .value(key)
                .and_then(OptionValue::as_number)
                .map_or(false, |number| number.is_roughly_equal(0.0))
        });

        if all_zero {
            Decision::Reject
        } else {
            Decision::Accept
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use shared::{category, priority, GameOption};

    fn speed_store() -> OptionStore {
        let mut store = OptionStore::new();
        store.apply(&OptionOp::Set(GameOption::new(
            category::NONE,
            option_name::PLAYER_SPEED,
            OptionValue::number(1.25, 0.25, 0.25, 3.0, false, "{0}x"),
            priority::A + 3,
        )));
        store
    }

    fn speed(value: f32) -> OptionValue {
        OptionValue::number(value, 0.25, 0.25, 3.0, false, "{0}x")
    }

    fn tasks_store(common: f32, long: f32, short: f32) -> OptionStore {
        let mut store = OptionStore::new();
        for (i, (key, value)) in [
            (option_name::COMMON_TASKS, common),
            (option_name::LONG_TASKS, long),
            (option_name::SHORT_TASKS, short),
        ]
        .into_iter()
        .enumerate()
        {
            store.apply(&OptionOp::Set(GameOption::new(
                category::TASKS,
                key,
                OptionValue::number(value, 1.0, 0.0, 5.0, false, "{0} tasks"),
                priority::C + 2 + i as u32,
            )));
        }
        store
    }

    #[test]
    fn test_commit_excludes_originator() {
        let mut store = speed_store();
        let mut transport = MemoryTransport::new();

        let outcome = propose(
            &mut store,
            1,
            option_name::PLAYER_SPEED,
            speed(2.0),
            &mut transport,
            |_, _| Decision::Accept,
        )
        .unwrap();

        assert!(matches!(outcome, ChangeOutcome::Committed(_)));
        assert_eq!(store.number(option_name::PLAYER_SPEED), Some(2.0));
        assert!(transport.ops_for(1).is_empty());
        assert_eq!(transport.ops_for(2).len(), 1);
    }

    #[test]
    fn test_clamped_commit_corrects_originator() {
        let mut store = speed_store();
        let mut transport = MemoryTransport::new();

        propose(
            &mut store,
            1,
            option_name::PLAYER_SPEED,
            OptionValue::number(9.0, 0.25, 0.25, 10.0, false, "{0}x"),
            &mut transport,
            |_, _| Decision::Accept,
        )
        .unwrap();

        assert_eq!(store.number(option_name::PLAYER_SPEED), Some(3.0));
        assert_eq!(transport.ops_for(1).len(), 1);
    }

    #[test]
    fn test_reject_restores_and_corrects_originator_only() {
        let mut store = speed_store();
        let mut transport = MemoryTransport::new();
        let mut seen = None;

        let outcome = propose(
            &mut store,
            7,
            option_name::PLAYER_SPEED,
            speed(5.0),
            &mut transport,
            |change, _| {
                seen = change.new.as_number().map(|number| number.value);
                Decision::Reject
            },
        )
        .unwrap();

        assert_eq!(seen, Some(3.0));
        assert!(matches!(outcome, ChangeOutcome::Reverted(_)));
        assert_eq!(store.number(option_name::PLAYER_SPEED), Some(1.25));
        assert_eq!(
            store
                .cached(".Player Speed")
                .and_then(OptionValue::as_number)
                .map(|number| number.value),
            Some(1.25)
        );

        assert_eq!(transport.deliveries.len(), 1);
        assert!(transport.ops_for(8).is_empty());
        match &transport.ops_for(7)[..] {
            [OptionOp::Set(option)] => {
                assert_eq!(option.value.as_number().unwrap().value, 1.25)
            }
            other => panic!("Unexpected correction {:?}", other),
        }
    }

    #[test]
    fn test_unknown_key_sends_nothing() {
        let mut store = speed_store();
        let mut transport = MemoryTransport::new();

        let result = propose(
            &mut store,
            1,
            "Not An Option",
            speed(1.0),
            &mut transport,
            |_, _| Decision::Accept,
        );

        assert_eq!(
            result,
            Err(OptionError::UnknownKey("Not An Option".to_string()))
        );
        assert!(transport.deliveries.is_empty());
    }

    #[test]
    fn test_type_mismatch_sends_nothing() {
        let mut store = speed_store();
        let mut transport = MemoryTransport::new();

        let result = propose(
            &mut store,
            1,
            option_name::PLAYER_SPEED,
            OptionValue::boolean(true),
            &mut transport,
            |_, _| Decision::Accept,
        );

        assert!(matches!(result, Err(OptionError::TypeMismatch { .. })));
        assert!(transport.deliveries.is_empty());
        assert_eq!(store.number(option_name::PLAYER_SPEED), Some(1.25));
    }

    #[test]
    fn test_task_guard_rejects_all_zero() {
        let guard = TaskCountGuard;
        let store = tasks_store(0.0, 0.0, 0.0);
        let change = OptionChange {
            key: option_name::SHORT_TASKS.to_string(),
            old: OptionValue::number(1.0, 1.0, 0.0, 5.0, false, ""),
            new: OptionValue::number(0.0, 1.0, 0.0, 5.0, false, ""),
            origin: Some(1),
        };

        assert_eq!(guard.on_option_changed(&change, &store), Decision::Reject);
        assert_eq!(
            guard.on_option_changed(&change, &tasks_store(0.0, 1.0, 0.0)),
            Decision::Accept
        );
    }

    #[test]
    fn test_task_guard_ignores_other_keys() {
        let change = OptionChange {
            key: option_name::PLAYER_SPEED.to_string(),
            old: speed(1.0),
            new: speed(2.0),
            origin: None,
        };
        assert_eq!(
            TaskCountGuard.on_option_changed(&change, &tasks_store(0.0, 0.0, 0.0)),
            Decision::Accept
        );
    }
}
