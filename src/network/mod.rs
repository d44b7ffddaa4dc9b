//! Network layer: the TCP server, the RESP codec, and connection tracking

pub mod connection;
pub mod protocol;
pub mod server;

pub use connection::{ConnectionHandle, ConnectionPool};
pub use server::TcpServer;
