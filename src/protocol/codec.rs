//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Payload by Command Type
//! - GET / DEL / INCR / SMEMBERS: key_len (4) + key
//! - PUT:  key_len (4) + key + value
//! - SADD: key_len (4) + key + member
//! - RAISE: key_len (4) + key + value (8, BE)
//! - PING: empty

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{Result, SiteError};
use crate::kv::{MAX_KEY_BYTES, MAX_VALUE_BYTES};
use super::{Command, CommandType, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size: a PUT of the largest key and value
pub const MAX_PAYLOAD_SIZE: u32 = (4 + MAX_KEY_BYTES + MAX_VALUE_BYTES) as u32;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut payload = BytesMut::new();
    match command {
        Command::Get { key }
        | Command::Delete { key }
        | Command::Incr { key }
        | Command::SMembers { key } => put_key(&mut payload, key),
        Command::Put { key, value } => {
            put_key(&mut payload, key);
            payload.put_slice(value);
        }
        Command::SAdd { key, member } => {
            put_key(&mut payload, key);
            payload.put_slice(member);
        }
        Command::Raise { key, value } => {
            put_key(&mut payload, key);
            payload.put_u64(*value);
        }
        Command::Ping => {}
    }

    frame(command.command_type() as u8, &payload)
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (type_byte, payload) = split_frame(bytes, "command")?;

    let Some(command_type) = CommandType::from_byte(type_byte) else {
        return Err(SiteError::Protocol(format!(
            "Unknown command type: 0x{:02x}",
            type_byte
        )));
    };

    match command_type {
        CommandType::Ping => {
            if !payload.is_empty() {
                return Err(SiteError::Protocol(format!(
                    "PING command: unexpected payload of {} bytes",
                    payload.len()
                )));
            }
            Ok(Command::Ping)
        }
        CommandType::Get => Ok(Command::Get { key: take_key(payload, "GET")?.0 }),
        CommandType::Delete => Ok(Command::Delete { key: take_key(payload, "DELETE")?.0 }),
        CommandType::Incr => Ok(Command::Incr { key: take_key(payload, "INCR")?.0 }),
        CommandType::SMembers => Ok(Command::SMembers { key: take_key(payload, "SMEMBERS")?.0 }),
        CommandType::Put => {
            let (key, rest) = take_key(payload, "PUT")?;
            Ok(Command::Put { key, value: rest.to_vec() })
        }
        CommandType::SAdd => {
            let (key, rest) = take_key(payload, "SADD")?;
            Ok(Command::SAdd { key, member: rest.to_vec() })
        }
        CommandType::Raise => {
            let (key, rest) = take_key(payload, "RAISE")?;
            let bytes: [u8; 8] = rest.try_into().map_err(|_| {
                SiteError::Protocol(format!(
                    "RAISE command: expected an 8-byte value, got {} bytes",
                    rest.len()
                ))
            })?;
            Ok(Command::Raise { key, value: u64::from_be_bytes(bytes) })
        }
    }
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    frame(response.status as u8, payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes, "response")?;

    let status = match status_byte {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::Error,
        _ => {
            return Err(SiteError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    decode_command(&read_frame(reader)?)
}

/// Write a command to a stream
///
/// A command the peer would refuse as oversized is rejected before any byte
/// is sent, leaving the stream usable.
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let message = encode_command(command);
    check_payload_len(message.len() - HEADER_SIZE)?;
    writer.write_all(&message)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    decode_response(&read_frame(reader)?)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Private Helpers
// =============================================================================

fn frame(type_byte: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(type_byte);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    message.to_vec()
}

fn check_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD_SIZE as usize {
        return Err(SiteError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn put_key(buf: &mut BytesMut, key: &[u8]) {
    buf.put_u32(key.len() as u32);
    buf.put_slice(key);
}

/// Validate the header and return (type byte, payload)
fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(SiteError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    check_payload_len(payload_len as usize)?;

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(SiteError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..total_len]))
}

/// Split a length-prefixed key off the front of a payload
fn take_key<'a>(payload: &'a [u8], name: &str) -> Result<(Vec<u8>, &'a [u8])> {
    if payload.len() < 4 {
        return Err(SiteError::Protocol(format!(
            "{} command: missing key length",
            name
        )));
    }

    let key_len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    if payload.len() - 4 < key_len {
        return Err(SiteError::Protocol(format!(
            "{} command: incomplete key (expected {}, got {})",
            name,
            key_len,
            payload.len() - 4
        )));
    }

    Ok((payload[4..4 + key_len].to_vec(), &payload[4 + key_len..]))
}

/// Read header + payload off a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    check_payload_len(payload_len as usize)?;

    let mut message = vec![0u8; HEADER_SIZE + payload_len as usize];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;
    Ok(message)
}
