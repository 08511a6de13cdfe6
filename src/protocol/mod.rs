//! Protocol Module
//!
//! Defines the wire protocol between `RemoteKv` and the `sitesmith-kv`
//! server.
//!
//! ## Protocol Format (V1 - Simple Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: GET      - Payload: key_len (4) + key
//! - 0x02: PUT      - Payload: key_len (4) + key + value
//! - 0x03: DEL      - Payload: key_len (4) + key
//! - 0x04: PING     - Payload: empty
//! - 0x05: INCR     - Payload: key_len (4) + key
//! - 0x06: SADD     - Payload: key_len (4) + key + member
//! - 0x07: SMEMBERS - Payload: key_len (4) + key
//! - 0x08: RAISE    - Payload: key_len (4) + key + value (8)
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{Response, Status};
pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
