//! TCP Server
//!
//! Accepts connections and dispatches to worker threads.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use super::Connection;

/// How often the idle acceptor re-checks the shutdown flag
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// TCP server for the key-value engine
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Flag that stops `run` when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Serve until shutdown (blocking)
    ///
    /// Workers finish their current connection before `run` returns.
    pub fn run(&self) -> Result<()> {
        let workers = self.config.max_connections.max(1);
        let (sender, receiver) = channel::bounded::<TcpStream>(workers);

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let receiver = receiver.clone();
                let engine = Arc::clone(&self.engine);
                let shutdown = Arc::clone(&self.shutdown);
                let timeouts = (self.config.read_timeout_ms, self.config.write_timeout_ms);
                thread::Builder::new()
                    .name(format!("kv-worker-{}", id))
                    .spawn(move || worker_loop(receiver, engine, shutdown, timeouts))
            })
            .collect::<std::io::Result<_>>()?;

        tracing::info!(
            addr = %self.local_addr()?,
            workers,
            "Key-value server listening"
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::trace!(%peer, "Accepted connection");
                    stream.set_nonblocking(false)?;
                    if sender.send(stream).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => tracing::warn!("Accept failed: {}", e),
            }
        }

        drop(sender);
        for handle in handles {
            let _ = handle.join();
        }

        tracing::info!("Key-value server stopped");
        Ok(())
    }
}

fn worker_loop(
    receiver: Receiver<TcpStream>,
    engine: Arc<Engine>,
    shutdown: Arc<AtomicBool>,
    (read_ms, write_ms): (u64, u64),
) {
    loop {
        let stream = match receiver.recv_timeout(ACCEPT_POLL) {
            Ok(stream) => stream,
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::SeqCst) {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        };

        let result = Connection::new(stream, Arc::clone(&engine)).and_then(|mut conn| {
            conn.set_timeouts(read_ms, write_ms)?;
            conn.handle()
        });
        match result {
            Ok(served) => tracing::trace!(served, "Worker released connection"),
            Err(e) => tracing::debug!("Connection ended with error: {}", e),
        }
    }
}
