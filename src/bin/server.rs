//! RustyRadish server binary
//!
//! Startup order matters: configuration and logging first, then the
//! snapshot load, then the snapshot worker and the TCP server. On shutdown
//! the accept loop drains before the final dump so the snapshot sees every
//! acknowledged write.

use clap::{value_parser, Arg, Command};
use rustyradish::logging::LoggingSystem;
use rustyradish::{Config, MemoryStore, RustyRadishServer, SnapshotService};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug)]
struct ServerArgs {
    config_file: Option<PathBuf>,
    port: Option<u16>,
    bind_address: Option<String>,
    log_level: Option<String>,
}

fn parse_args() -> ServerArgs {
    let matches = Command::new("rustyradish-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("An in-memory RESP key-value store with typed keys, TTLs, and snapshots")
        .arg(
            Arg::new("port")
                .value_name("PORT")
                .help("Listen port (default 6379)")
                .index(1)
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDRESS")
                .help("Bind address (overrides config file)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .get_matches();

    ServerArgs {
        config_file: matches.get_one::<PathBuf>("config").cloned(),
        port: matches.get_one::<u16>("port").copied(),
        bind_address: matches.get_one::<String>("bind").cloned(),
        log_level: matches.get_one::<String>("log-level").cloned(),
    }
}

fn apply_cli_overrides(mut config: Config, args: &ServerArgs) -> Config {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref bind_address) = args.bind_address {
        config.server.bind_address = bind_address.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    config
}

fn display_startup_info(config: &Config) {
    info!("RustyRadish v{}", env!("CARGO_PKG_VERSION"));
    info!("  bind address:      {}", config.listen_addr());
    info!("  max connections:   {}", config.server.max_connections);
    info!(
        "  worker threads:    {}",
        config
            .server
            .worker_threads
            .map_or("auto".to_string(), |n| n.to_string())
    );
    info!(
        "  snapshot:          {} every {}s",
        config.storage.snapshot_path.display(),
        config.storage.snapshot_interval_secs
    );
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                return std::future::pending().await;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "failed to install SIGINT handler");
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => warn!("received SIGTERM; shutting down"),
            _ = sigint.recv() => warn!("received SIGINT; shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            return std::future::pending().await;
        }
        warn!("received Ctrl+C; shutting down");
    }
}

async fn run(config: Config) -> rustyradish::Result<()> {
    display_startup_info(&config);

    let storage = Arc::new(MemoryStore::with_sweep_interval(Duration::from_secs(
        config.storage.sweep_interval_secs,
    )));

    // Restore whatever the previous process managed to write.
    SnapshotService::load_existing(&storage, &config.storage.snapshot_path).await;

    let snapshots = SnapshotService::start(
        Arc::clone(&storage),
        config.storage.snapshot_path.clone(),
        Duration::from_secs(config.storage.snapshot_interval_secs),
    );

    let server = RustyRadishServer::with_storage(config, Arc::clone(&storage))?;

    let shutdown_tx = server.shutdown_sender();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    server.start().await?;

    // Accept loop has exited and connections are drained; write the final
    // snapshot.
    snapshots.shutdown().await?;
    Ok(())
}

fn main() {
    let args = parse_args();

    let config = match &args.config_file {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => apply_cli_overrides(config, &args),
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = LoggingSystem::new(config.clone()).initialize() {
        eprintln!("failed to initialize logging: {e}");
        process::exit(1);
    }

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = config.server.worker_threads {
        builder.worker_threads(workers);
    }
    let runtime = match builder.build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build runtime");
            process::exit(1);
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => info!("shutdown complete"),
        Err(e) => {
            error!(error = %e, "server failed");
            process::exit(1);
        }
    }
}
