//! Counter and set value encodings shared by every backend

use std::collections::BTreeSet;

use crate::error::{Result, SiteError};

/// Parse a stored counter; absent means zero
pub fn decode_counter(value: Option<&[u8]>) -> Result<u64> {
    let Some(bytes) = value else {
        return Ok(0);
    };
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| SiteError::Storage(format!("Value is not a counter: {:?}", String::from_utf8_lossy(bytes))))
}

/// Compute the incremented counter; returns (encoded value, new count)
pub fn next_counter(current: Option<&[u8]>) -> Result<(Vec<u8>, u64)> {
    let next = decode_counter(current)?
        .checked_add(1)
        .ok_or_else(|| SiteError::Storage("Counter overflow".to_string()))?;
    Ok((next.to_string().into_bytes(), next))
}

/// Compute `max(current, target)`; the encoded value is `None` when the
/// counter already covers `target`
pub fn raise_counter(current: Option<&[u8]>, target: u64) -> Result<(Option<Vec<u8>>, u64)> {
    let value = decode_counter(current)?;
    if value >= target {
        return Ok((None, value));
    }
    Ok((Some(target.to_string().into_bytes()), target))
}

/// Decode a stored set; absent means empty
pub fn decode_members(value: Option<&[u8]>) -> Result<BTreeSet<Vec<u8>>> {
    match value {
        None => Ok(BTreeSet::new()),
        Some(bytes) => bincode::deserialize(bytes)
            .map_err(|e| SiteError::Storage(format!("Value is not a set: {}", e))),
    }
}

pub fn encode_members(members: &BTreeSet<Vec<u8>>) -> Result<Vec<u8>> {
    Ok(bincode::serialize(members)?)
}

/// Add `member` to the encoded set; `None` when it is already present
pub fn add_member(current: Option<&[u8]>, member: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut members = decode_members(current)?;
    if !members.insert(member.to_vec()) {
        return Ok(None);
    }
    Ok(Some(encode_members(&members)?))
}
