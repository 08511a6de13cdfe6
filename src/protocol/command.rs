//! Command definitions
//!
//! Represents commands from clients.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Put = 0x02,
    Delete = 0x03,
    Ping = 0x04,
    Incr = 0x05,
    SAdd = 0x06,
    SMembers = 0x07,
    Raise = 0x08,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Get),
            0x02 => Some(CommandType::Put),
            0x03 => Some(CommandType::Delete),
            0x04 => Some(CommandType::Ping),
            0x05 => Some(CommandType::Incr),
            0x06 => Some(CommandType::SAdd),
            0x07 => Some(CommandType::SMembers),
            0x08 => Some(CommandType::Raise),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: Vec<u8> },

    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Ping (health check)
    Ping,

    /// Atomically increment a counter; replies with the new value (u64 BE)
    Incr { key: Vec<u8> },

    /// Add a member to a set; replies 1 if added, 0 if already present
    SAdd { key: Vec<u8>, member: Vec<u8> },

    /// List a set; replies with the encoded set
    SMembers { key: Vec<u8> },

    /// Raise a counter to at least `value`; replies with the result (u64 BE)
    Raise { key: Vec<u8>, value: u64 },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Delete { .. } => CommandType::Delete,
            Command::Ping => CommandType::Ping,
            Command::Incr { .. } => CommandType::Incr,
            Command::SAdd { .. } => CommandType::SAdd,
            Command::SMembers { .. } => CommandType::SMembers,
            Command::Raise { .. } => CommandType::Raise,
        }
    }

    /// True for commands that change state
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Put { .. }
                | Command::Delete { .. }
                | Command::Incr { .. }
                | Command::SAdd { .. }
                | Command::Raise { .. }
        )
    }
}
