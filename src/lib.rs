//! RustyRadish - an in-memory RESP key-value store
//!
//! Typed keys (strings, lists, hashes) with per-key expiration, a binary
//! snapshot file for best-effort persistence, and a tokio TCP front end
//! speaking a RESP subset.

// Core modules
pub mod config;
pub mod error;
pub mod logging;

// Feature modules
pub mod commands;
pub mod network;
pub mod storage;

// Public API exports
pub use commands::{CommandRegistry, CommandResult, ResponseValue};
pub use config::Config;
pub use error::{Result, RustyRadishError};
pub use network::TcpServer;
pub use storage::{MemoryStore, SnapshotService};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Fully wired server: config, store, command registry, and TCP front end.
pub struct RustyRadishServer {
    config: Arc<Config>,
    storage: Arc<MemoryStore>,
    registry: Arc<CommandRegistry>,
    tcp_server: Arc<TcpServer>,
}

impl RustyRadishServer {
    /// Build a server with a fresh store.
    pub fn new(config: Config) -> Result<Self> {
        let storage = Arc::new(MemoryStore::with_sweep_interval(Duration::from_secs(
            config.storage.sweep_interval_secs,
        )));
        Self::with_storage(config, storage)
    }

    /// Build a server around an existing store (shared with the snapshot
    /// worker).
    pub fn with_storage(config: Config, storage: Arc<MemoryStore>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let registry = Arc::new(CommandRegistry::with_default_commands());
        let tcp_server = Arc::new(TcpServer::new(
            Arc::clone(&config),
            Arc::clone(&storage),
            Arc::clone(&registry),
        ));

        Ok(Self {
            config,
            storage,
            registry,
            tcp_server,
        })
    }

    /// Serve until shutdown is signalled, then drain connections.
    pub async fn start(&self) -> Result<()> {
        tracing::info!(
            commands = self.registry.command_count(),
            addr = %self.config.listen_addr(),
            "starting server"
        );
        self.tcp_server.start().await
    }

    /// Serve in the background on whatever port the OS picks; returns the
    /// bound address. Used by tests.
    pub async fn start_with_addr(&self) -> Result<SocketAddr> {
        Arc::clone(&self.tcp_server).start_with_addr().await
    }

    /// Sender wired to the accept loop and every connection handler.
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.tcp_server.shutdown_sender()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Arc<MemoryStore> {
        &self.storage
    }

    pub fn command_registry(&self) -> &CommandRegistry {
        &self.registry
    }
}
