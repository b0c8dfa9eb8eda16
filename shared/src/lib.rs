use serde::{Deserialize, Serialize};

pub mod options;

pub use options::{
    category, option_name, priority, BooleanValue, EnumValue, GameOption, NumberValue,
    OptionKind, OptionOp, OptionValue,
};

pub const PROTOCOL_VERSION: u32 = 1;

/// Receive buffer size for a single datagram
pub const MAX_PACKET_SIZE: usize = 4096;

/// Maximum number of option operations carried by one `Options` packet
pub const OPTION_CHUNK_SIZE: usize = 8;

/// Schema rebuild passes allowed before a transition is abandoned
pub const MAX_TRANSITION_ITERATIONS: u32 = 5;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        user_id: Option<String>,
    },
    Heartbeat,
    SetOption {
        key: String,
        value: OptionValue,
    },
    Disconnect,

    Connected {
        client_id: u32,
    },
    Options {
        ops: Vec<OptionOp>,
    },
    Disconnected {
        reason: String,
    },
}
