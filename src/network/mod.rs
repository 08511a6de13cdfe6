//! Network Module
//!
//! Serves the engine to `RemoteKv` clients over the binary protocol.
//!
//! One acceptor thread hands sockets to a fixed pool of workers over a
//! bounded crossbeam channel; each worker owns a session until the peer
//! leaves or idles past the read timeout.

mod connection;
mod server;

pub use connection::Connection;
pub use server::Server;
