//! TCP server with async connection handling
//!
//! The accept loop hands each socket to its own task; the runtime's worker
//! threads provide the parallelism. A broadcast channel fans the shutdown
//! signal out to the accept loop and every connection handler, and the pool
//! drains before `start` returns so a final snapshot sees all writes.

use crate::commands::{CommandRegistry, ParsedCommand};
use crate::config::Config;
use crate::error::{Result, RustyRadishError};
use crate::network::connection::{ConnectionHandle, ConnectionPool};
use crate::network::protocol;
use crate::storage::MemoryStore;
use bytes::BytesMut;
use socket2::{SockRef, TcpKeepalive};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// How long `start` waits for in-flight connections after the accept loop
/// stops.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Listen backlog for the accepting socket.
const LISTEN_BACKLOG: u32 = 128;

/// TCP front end for the store.
pub struct TcpServer {
    config: Arc<Config>,
    storage: Arc<MemoryStore>,
    registry: Arc<CommandRegistry>,
    pool: Arc<ConnectionPool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TcpServer {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<MemoryStore>,
        registry: Arc<CommandRegistry>,
    ) -> Self {
        let pool = Arc::new(ConnectionPool::new(config.server.max_connections));
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            storage,
            registry,
            pool,
            shutdown_tx,
        }
    }

    /// A sender that triggers graceful shutdown from anywhere (signal
    /// handlers, tests).
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn connection_pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Bind and serve until shutdown, then drain the pool.
    pub async fn start(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.run_accept_loop(listener).await;
        self.drain_connections().await;
        info!("TCP server stopped");
        Ok(())
    }

    /// Bind, then serve in a background task. Returns the bound address;
    /// used by tests that need an ephemeral port.
    pub async fn start_with_addr(self: Arc<Self>) -> Result<SocketAddr> {
        let listener = self.bind().await?;
        let addr = listener
            .local_addr()
            .map_err(|e| RustyRadishError::NetworkError {
                message: "failed to read local address".to_string(),
                source: Some(e),
            })?;

        let server = Arc::clone(&self);
        tokio::spawn(async move {
            server.run_accept_loop(listener).await;
            server.drain_connections().await;
        });

        Ok(addr)
    }

    async fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr =
            self.config
                .listen_addr()
                .parse()
                .map_err(|_| RustyRadishError::ConfigError {
                    message: format!("invalid listen address {}", self.config.listen_addr()),
                    config_key: Some("server.bind_address".to_string()),
                })?;

        let bind_error = |e: std::io::Error| RustyRadishError::NetworkError {
            message: format!("failed to bind {addr}"),
            source: Some(e),
        };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(bind_error)?;

        info!(addr = %addr, "listening");
        Ok(listener)
    }

    async fn run_accept_loop(&self, listener: TcpListener) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.accept_connection(stream, addr),
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            // Brief pause so a hot error (EMFILE and friends)
                            // does not spin the loop.
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received; no longer accepting");
                    break;
                }
            }
        }
    }

    fn accept_connection(&self, mut stream: TcpStream, addr: SocketAddr) {
        let Some(handle) = self.pool.try_register(addr) else {
            warn!(
                remote_addr = %addr,
                active = self.pool.active_connections(),
                "connection limit reached; rejecting"
            );
            tokio::spawn(async move {
                let _ = stream
                    .write_all(b"-ERR server connection limit reached\r\n")
                    .await;
                let _ = stream.shutdown().await;
            });
            return;
        };

        if let Err(e) = configure_socket(&stream, &self.config) {
            warn!(remote_addr = %addr, error = %e, "failed to tune socket");
        }

        info!(
            client_id = %handle.client_id,
            remote_addr = %addr,
            active = self.pool.active_connections(),
            "client connected"
        );

        let storage = Arc::clone(&self.storage);
        let registry = Arc::clone(&self.registry);
        let config = Arc::clone(&self.config);
        let pool = Arc::clone(&self.pool);
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let client_id = handle.client_id;
            handle_connection(stream, handle, storage, registry, config, shutdown_rx).await;
            pool.deregister(client_id);
        });
    }

    async fn drain_connections(&self) {
        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        while !self.pool.is_empty() {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    remaining = self.pool.active_connections(),
                    "drain timed out; abandoning remaining connections"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        debug!("all connections drained");
    }
}

/// Apply per-socket options: NODELAY plus keepalive probing so silently
/// dead peers get reaped even though read timeouts are transient.
fn configure_socket(stream: &TcpStream, config: &Config) -> std::io::Result<()> {
    stream.set_nodelay(config.network.tcp_nodelay)?;

    if config.network.tcp_keepalive {
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(config.network.keepalive_idle_secs))
            .with_interval(Duration::from_secs(config.network.keepalive_interval_secs));
        #[cfg(not(windows))]
        let keepalive = keepalive.with_retries(config.network.keepalive_probes);

        SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
    }

    Ok(())
}

/// Per-connection loop: read, frame, dispatch, reply in order.
async fn handle_connection(
    mut stream: TcpStream,
    handle: Arc<ConnectionHandle>,
    storage: Arc<MemoryStore>,
    registry: Arc<CommandRegistry>,
    config: Arc<Config>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let client_id = handle.client_id;
    let remote_addr = handle.remote_addr;
    let read_timeout = Duration::from_secs(config.network.read_timeout_secs);
    let write_timeout = Duration::from_secs(config.network.write_timeout_secs);
    let mut buffer = BytesMut::with_capacity(config.network.read_chunk_size);

    'conn: loop {
        buffer.reserve(config.network.read_chunk_size);

        tokio::select! {
            result = timeout(read_timeout, stream.read_buf(&mut buffer)) => {
                match result {
                    // A read timeout is transient: the loop keeps waiting and
                    // the kernel's keepalive probes decide when the peer is
                    // actually gone.
                    Err(_) => {
                        debug!(client_id = %client_id, "read timed out; still waiting");
                        continue;
                    }
                    Ok(Ok(0)) => {
                        debug!(client_id = %client_id, "peer closed the connection");
                        break;
                    }
                    Ok(Err(e)) => {
                        warn!(client_id = %client_id, error = %e, "read failed");
                        break;
                    }
                    Ok(Ok(_)) => {}
                }

                if buffer.len() > config.network.max_buffer_size {
                    let err = RustyRadishError::PayloadTooLarge {
                        size: buffer.len(),
                        limit: config.network.max_buffer_size,
                    };
                    warn!(client_id = %client_id, size = buffer.len(), "input buffer over cap");
                    let reply = protocol::encode_error(&err.to_client_error());
                    let _ = timeout(write_timeout, stream.write_all(&reply)).await;
                    break;
                }

                let frames = match protocol::split_frames(&mut buffer) {
                    Ok(frames) => frames,
                    Err(e) => {
                        // Framing limits were broken; answer and hang up.
                        warn!(client_id = %client_id, error = %e, "protocol violation");
                        let reply = protocol::encode_error(&e.to_client_error());
                        let _ = timeout(write_timeout, stream.write_all(&reply)).await;
                        break;
                    }
                };

                // Zero frames just means a partial request; read more.
                for frame in frames {
                    let tokens = protocol::parse_frame(&frame);
                    let reply = match ParsedCommand::from_tokens(tokens) {
                        Some(cmd) => {
                            debug!(
                                client_id = %client_id,
                                command = %cmd.name,
                                args = cmd.args.len(),
                                "dispatching"
                            );
                            let result = registry.execute(&cmd, &storage).await;
                            handle.record_command();
                            protocol::encode(&result.into_response())
                        }
                        None => protocol::encode_error("ERR protocol error: empty command"),
                    };

                    match timeout(write_timeout, stream.write_all(&reply)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!(client_id = %client_id, error = %e, "write failed");
                            break 'conn;
                        }
                        Err(_) => {
                            warn!(client_id = %client_id, "write timed out");
                            break 'conn;
                        }
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!(client_id = %client_id, "shutdown signal; closing connection");
                break;
            }
        }
    }

    let _ = stream.shutdown().await;
    info!(
        client_id = %client_id,
        remote_addr = %remote_addr,
        commands = handle.commands_processed(),
        "client disconnected"
    );
}
