//! Error types for the option engine and its persistence bridge
//!
//! None of these are fatal to a room. Callers log them and carry on with the
//! last committed option state.

use shared::OptionKind;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum OptionError {
    #[error("option '{0}' is not declared")]
    UnknownKey(String),

    #[error("option '{key}' holds a {expected} value, got {found}")]
    TypeMismatch {
        key: String,
        expected: OptionKind,
        found: OptionKind,
    },

    #[error("game mode '{0}' is not registered")]
    UnknownGamemode(String),

    #[error(
        "option schema did not settle after {iterations} transitions; \
         two options in different categories likely share a name"
    )]
    TransitionCycleExceeded { iterations: u32 },
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("saved options could not be decoded: {0}")]
    Codec(#[from] bincode::Error),
}
