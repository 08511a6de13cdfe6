//! Server replies

/// Outcome byte of a reply frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
}

/// One reply; the payload meaning depends on the command
///
/// GET carries the value, INCR and RAISE the resulting count (u64 BE), SADD
/// `[1]` or `[0]`, SMEMBERS the encoded set and ERROR a UTF-8 message. An
/// empty payload decodes as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub payload: Option<Vec<u8>>,
}

impl Response {
    pub fn ok(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Error text carried by an ERROR response
    pub fn error_message(&self) -> Option<String> {
        match self.status {
            Status::Error => Some(
                self.payload
                    .as_deref()
                    .map(|p| String::from_utf8_lossy(p).into_owned())
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }
}
