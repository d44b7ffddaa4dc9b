//! Connection tracking
//!
//! The pool registers every live connection, enforces the connection cap,
//! and lets shutdown wait for handlers to drain. Handlers own their sockets;
//! the pool only holds metadata.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Per-connection metadata shared between a handler and the pool.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub client_id: Uuid,
    pub remote_addr: SocketAddr,
    pub connected_at: Instant,
    commands_processed: AtomicU64,
}

impl ConnectionHandle {
    fn new(remote_addr: SocketAddr) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            remote_addr,
            connected_at: Instant::now(),
            commands_processed: AtomicU64::new(0),
        }
    }

    pub fn record_command(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn commands_processed(&self) -> u64 {
        self.commands_processed.load(Ordering::Relaxed)
    }
}

/// Registry of live connections with a hard cap.
pub struct ConnectionPool {
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    max_connections: usize,
    total_accepted: AtomicU64,
    total_rejected: AtomicU64,
}

impl ConnectionPool {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            max_connections,
            total_accepted: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
        }
    }

    /// Register a new connection, or `None` when the pool is full.
    pub fn try_register(&self, remote_addr: SocketAddr) -> Option<Arc<ConnectionHandle>> {
        if self.connections.len() >= self.max_connections {
            self.total_rejected.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let handle = Arc::new(ConnectionHandle::new(remote_addr));
        self.connections.insert(handle.client_id, Arc::clone(&handle));
        self.total_accepted.fetch_add(1, Ordering::Relaxed);
        debug!(
            client_id = %handle.client_id,
            remote_addr = %remote_addr,
            active = self.connections.len(),
            "connection registered"
        );
        Some(handle)
    }

    pub fn deregister(&self, client_id: Uuid) {
        if self.connections.remove(&client_id).is_some() {
            debug!(
                client_id = %client_id,
                active = self.connections.len(),
                "connection deregistered"
            );
        }
    }

    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn total_accepted(&self) -> u64 {
        self.total_accepted.load(Ordering::Relaxed)
    }

    pub fn total_rejected(&self) -> u64 {
        self.total_rejected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:45000".parse().unwrap()
    }

    #[test]
    fn registers_up_to_the_cap() {
        let pool = ConnectionPool::new(2);

        let a = pool.try_register(addr()).unwrap();
        let _b = pool.try_register(addr()).unwrap();
        assert!(pool.try_register(addr()).is_none());

        assert_eq!(pool.active_connections(), 2);
        assert_eq!(pool.total_accepted(), 2);
        assert_eq!(pool.total_rejected(), 1);

        pool.deregister(a.client_id);
        assert_eq!(pool.active_connections(), 1);
        assert!(pool.try_register(addr()).is_some());
    }

    #[test]
    fn deregistering_unknown_id_is_harmless() {
        let pool = ConnectionPool::new(1);
        pool.deregister(Uuid::new_v4());
        assert!(pool.is_empty());
    }

    #[test]
    fn handles_count_commands() {
        let pool = ConnectionPool::new(1);
        let handle = pool.try_register(addr()).unwrap();

        assert_eq!(handle.commands_processed(), 0);
        handle.record_command();
        handle.record_command();
        assert_eq!(handle.commands_processed(), 2);
    }
}
