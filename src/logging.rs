//! Structured logging setup for RustyRadish
//!
//! Builds the tracing subscriber from [`LoggingConfig`]: env-filterable
//! level, pretty/compact/json formats, and optional file output through an
//! hourly-rotating writer.

use crate::config::{Config, LogFormat};
use crate::error::{Result, RustyRadishError};
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{warn, Level};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Logging system manager that owns subscriber installation.
#[derive(Debug)]
pub struct LoggingSystem {
    config: Config,
}

impl LoggingSystem {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Install the global tracing subscriber. Safe to call more than once;
    /// later calls leave the existing subscriber in place.
    pub fn initialize(&self) -> Result<()> {
        let level = parse_log_level(&self.config.logging.level)?;

        let env_filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();

        let timer = ChronoUtc::rfc_3339();

        match (&self.config.logging.format, &self.config.logging.file_path) {
            (LogFormat::Json, Some(path)) => {
                let writer = HourlyRotatingWriter::new(path.clone())?;
                let subscriber = Registry::default().with(env_filter).with(
                    fmt::layer()
                        .json()
                        .with_timer(timer)
                        .with_writer(move || writer.clone()),
                );
                try_init(subscriber.try_init());
            }
            (LogFormat::Json, None) => {
                let subscriber = Registry::default()
                    .with(env_filter)
                    .with(fmt::layer().json().with_timer(timer));
                try_init(subscriber.try_init());
            }
            (LogFormat::Pretty, Some(path)) => {
                let writer = HourlyRotatingWriter::new(path.clone())?;
                let subscriber = Registry::default().with(env_filter).with(
                    fmt::layer()
                        .with_timer(timer)
                        .with_ansi(false)
                        .with_writer(move || writer.clone()),
                );
                try_init(subscriber.try_init());
            }
            (LogFormat::Pretty, None) => {
                let subscriber = Registry::default()
                    .with(env_filter)
                    .with(fmt::layer().with_timer(timer).with_target(false));
                try_init(subscriber.try_init());
            }
            (LogFormat::Compact, Some(path)) => {
                let writer = HourlyRotatingWriter::new(path.clone())?;
                let subscriber = Registry::default().with(env_filter).with(
                    fmt::layer()
                        .compact()
                        .with_timer(timer)
                        .with_ansi(false)
                        .with_writer(move || writer.clone()),
                );
                try_init(subscriber.try_init());
            }
            (LogFormat::Compact, None) => {
                let subscriber = Registry::default()
                    .with(env_filter)
                    .with(fmt::layer().compact().with_timer(timer));
                try_init(subscriber.try_init());
            }
        }

        Ok(())
    }
}

fn try_init<E: std::fmt::Display>(result: std::result::Result<(), E>) {
    if let Err(e) = result {
        warn!("tracing subscriber already installed: {e}");
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(RustyRadishError::ConfigError {
            message: format!("invalid log level: {other}"),
            config_key: Some("logging.level".to_string()),
        }),
    }
}

/// File writer that opens a fresh `<base>.<YYYY-MM-DD-HH>` segment whenever
/// the UTC hour changes. Cloning shares the underlying handle, which is what
/// the subscriber's `MakeWriter` closure needs.
#[derive(Clone, Debug)]
pub struct HourlyRotatingWriter {
    base: PathBuf,
    state: Arc<Mutex<RotationState>>,
}

#[derive(Debug)]
struct RotationState {
    file: File,
    stamp: String,
}

impl HourlyRotatingWriter {
    pub fn new(base: PathBuf) -> Result<Self> {
        if let Some(parent) = base.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| RustyRadishError::ConfigError {
                    message: format!("failed to create log directory {}: {e}", parent.display()),
                    config_key: Some("logging.file_path".to_string()),
                })?;
            }
        }

        let stamp = Self::current_stamp();
        let file = Self::open_segment(&base, &stamp)?;
        Ok(Self {
            base,
            state: Arc::new(Mutex::new(RotationState { file, stamp })),
        })
    }

    fn current_stamp() -> String {
        Utc::now().format("%Y-%m-%d-%H").to_string()
    }

    fn segment_path(base: &Path, stamp: &str) -> PathBuf {
        let mut name = base.as_os_str().to_os_string();
        name.push(".");
        name.push(stamp);
        PathBuf::from(name)
    }

    fn open_segment(base: &Path, stamp: &str) -> Result<File> {
        let path = Self::segment_path(base, stamp);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RustyRadishError::ConfigError {
                message: format!("failed to open log file {}: {e}", path.display()),
                config_key: Some("logging.file_path".to_string()),
            })
    }
}

impl Write for HourlyRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().expect("log writer poisoned");
        let stamp = Self::current_stamp();
        if stamp != state.stamp {
            // Rotation failure keeps writing to the old segment.
            if let Ok(file) = Self::open_segment(&self.base, &stamp) {
                state.file = file;
                state.stamp = stamp;
            }
        }
        state.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().expect("log writer poisoned");
        state.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_levels() {
        assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("Info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
        assert_eq!(parse_log_level("error").unwrap(), Level::ERROR);
        assert!(parse_log_level("chatty").is_err());
    }

    #[test]
    fn writer_appends_to_stamped_segment() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("radish.log");

        let mut writer = HourlyRotatingWriter::new(base.clone()).unwrap();
        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();

        let stamp = HourlyRotatingWriter::current_stamp();
        let segment = HourlyRotatingWriter::segment_path(&base, &stamp);
        let contents = std::fs::read_to_string(segment).unwrap();
        assert_eq!(contents, "hello\n");
    }

    #[test]
    fn clones_share_the_same_segment() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("radish.log");

        let mut a = HourlyRotatingWriter::new(base.clone()).unwrap();
        let mut b = a.clone();
        a.write_all(b"one\n").unwrap();
        b.write_all(b"two\n").unwrap();
        a.flush().unwrap();

        let stamp = HourlyRotatingWriter::current_stamp();
        let segment = HourlyRotatingWriter::segment_path(&base, &stamp);
        let contents = std::fs::read_to_string(segment).unwrap();
        assert_eq!(contents, "one\ntwo\n");
    }
}
