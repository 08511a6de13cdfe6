//! Connection Handler
//!
//! One client session: read a frame, execute it against the engine, answer,
//! repeat until the peer hangs up or stays silent past the read timeout.

use std::io::{self, BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::{Result, SiteError};
use crate::protocol::{read_command, write_response, Command, Response};

/// A client session bound to the shared engine
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    engine: Arc<Engine>,
    peer: String,
    served: u64,
}

impl Connection {
    /// Wrap an accepted stream; Nagle is disabled since every frame is small
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            engine,
            peer,
            served: 0,
        })
    }

    /// Apply socket timeouts; zero leaves that direction blocking
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let as_timeout = |ms: u64| (ms > 0).then(|| Duration::from_millis(ms));
        self.reader.get_ref().set_read_timeout(as_timeout(read_ms))?;
        self.writer.get_ref().set_write_timeout(as_timeout(write_ms))?;
        Ok(())
    }

    /// Serve the session to completion; returns the number of commands answered
    ///
    /// A peer that disconnects or idles out ends the session cleanly. A frame
    /// that cannot be decoded gets an ERROR reply and ends it with that error,
    /// since the stream position is no longer trustworthy.
    pub fn handle(&mut self) -> Result<u64> {
        tracing::debug!(peer = %self.peer, "Session opened");

        while let Some(command) = self.next_command()? {
            let response = self.dispatch(command);
            match write_response(&mut self.writer, &response) {
                Ok(()) => self.served += 1,
                Err(SiteError::Io(ref e)) if is_disconnect(e) => break,
                Err(e) => {
                    tracing::warn!(peer = %self.peer, "Reply failed: {}", e);
                    return Err(e);
                }
            }
        }

        tracing::debug!(peer = %self.peer, served = self.served, "Session closed");
        Ok(self.served)
    }

    /// Next command, or `None` when the session is over
    fn next_command(&mut self) -> Result<Option<Command>> {
        match read_command(&mut self.reader) {
            Ok(command) => {
                tracing::trace!(peer = %self.peer, ?command, "Received");
                Ok(Some(command))
            }
            Err(SiteError::Io(ref e)) if is_disconnect(e) || is_idle(e) => Ok(None),
            Err(e) => {
                tracing::warn!(peer = %self.peer, "Unreadable frame: {}", e);
                let _ = write_response(&mut self.writer, &Response::error(&e.to_string()));
                Err(e)
            }
        }
    }

    fn dispatch(&self, command: Command) -> Response {
        let is_write = command.is_write();
        match self.engine.execute(command) {
            Ok(payload) => Response::ok(payload),
            Err(SiteError::KeyNotFound) => Response::not_found(),
            Err(e) => {
                if is_write {
                    tracing::warn!(peer = %self.peer, "Write failed: {}", e);
                }
                Response::error(&e.to_string())
            }
        }
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

// Unix reports an expired read timeout as WouldBlock, Windows as TimedOut
fn is_idle(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
