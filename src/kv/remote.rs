//! Remote backend over the `sitesmith-kv` wire protocol

use std::io::{self, BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, SiteError};
use crate::protocol::{read_response, write_command, Command, Response, Status};

use super::{check_sizes, decode_members, KvBackend};

/// Buffered halves of one TCP connection
struct Link {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Link {
    /// True when the server has hung up (idle timeout, restart) or left bytes
    /// nobody asked for; either way the next reply could not be trusted
    fn is_stale(&self) -> bool {
        if !self.reader.buffer().is_empty() {
            return true;
        }
        let stream = self.reader.get_ref();
        if stream.set_nonblocking(true).is_err() {
            return true;
        }
        let mut byte = [0u8; 1];
        let stale = match stream.peek(&mut byte) {
            // 0 bytes is an orderly close; anything else is unsolicited
            Ok(_) => true,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => false,
            Err(_) => true,
        };
        stale || stream.set_nonblocking(false).is_err()
    }
}

/// Client for a `sitesmith-kv` server
///
/// Holds one connection, opened on first use. Requests are serialized over
/// it. Before each request the connection is checked for a server-side
/// close and replaced if needed; after an I/O failure it is dropped and the
/// next request reconnects. Atomicity of `increment_and_get`, `raise_to`
/// and `add_to_set` comes from the server executing them under its write
/// lock.
pub struct RemoteKv {
    addr: String,
    timeout: Duration,
    link: Mutex<Option<Link>>,
}

impl RemoteKv {
    /// Create a client; no connection is made until the first request
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            link: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Health check
    pub fn ping(&self) -> Result<()> {
        self.call(Command::Ping).map(|_| ())
    }

    /// Remove a key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.call(Command::Delete { key: key.to_vec() }).map(|_| ())
    }

    /// Send one command and return its response; ERROR becomes `Err`
    fn call(&self, command: Command) -> Result<Response> {
        let mut guard = self.link.lock();
        if guard.as_ref().is_some_and(Link::is_stale) {
            tracing::debug!(addr = %self.addr, "Server closed the idle connection, reconnecting");
            *guard = None;
        }
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let Some(link) = guard.as_mut() else {
            return Err(SiteError::Network("connection unavailable".to_string()));
        };

        let result = write_command(&mut link.writer, &command)
            .and_then(|_| read_response(&mut link.reader));

        match result {
            Ok(response) => match response.error_message() {
                Some(message) => Err(SiteError::Persistence(format!(
                    "{} rejected {:?}: {}",
                    self.addr,
                    command.command_type(),
                    message
                ))),
                None => Ok(response),
            },
            Err(e) => {
                // The stream may be mid-frame; never reuse it
                *guard = None;
                Err(e)
            }
        }
    }

    fn connect(&self) -> Result<Link> {
        let addr = self
            .addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| SiteError::Network(format!("{} did not resolve", self.addr)))?;

        let stream = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| SiteError::Network(format!("connect to {} failed: {}", self.addr, e)))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        tracing::debug!(addr = %self.addr, "Connected to key-value server");
        Ok(Link {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }
}

impl KvBackend for RemoteKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let response = self.call(Command::Get { key: key.to_vec() })?;
        match response.status {
            Status::NotFound => Ok(None),
            _ => Ok(Some(response.payload.unwrap_or_default())),
        }
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        check_sizes(key, value)?;
        self.call(Command::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
        .map(|_| ())
    }

    fn increment_and_get(&self, key: &[u8]) -> Result<u64> {
        counter_reply(self.call(Command::Incr { key: key.to_vec() })?, "INCR")
    }

    fn raise_to(&self, key: &[u8], value: u64) -> Result<u64> {
        counter_reply(
            self.call(Command::Raise { key: key.to_vec(), value })?,
            "RAISE",
        )
    }

    fn add_to_set(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        let response = self.call(Command::SAdd {
            key: key.to_vec(),
            member: member.to_vec(),
        })?;
        Ok(response.payload.as_deref() == Some(&[1u8][..]))
    }

    fn members(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let response = self.call(Command::SMembers { key: key.to_vec() })?;
        Ok(decode_members(response.payload.as_deref())?.into_iter().collect())
    }
}

fn counter_reply(response: Response, command: &str) -> Result<u64> {
    let payload = response.payload.unwrap_or_default();
    let bytes: [u8; 8] = payload.as_slice().try_into().map_err(|_| {
        SiteError::Protocol(format!("{} reply has {} bytes, expected 8", command, payload.len()))
    })?;
    Ok(u64::from_be_bytes(bytes))
}
