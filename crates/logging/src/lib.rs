//! Logging for chainrun
//!
//! Console output goes through a `tracing_subscriber` registry filtered by
//! `RUST_LOG` (or the configured level). A second, file-backed layer keeps
//! the session log: only events emitted with `target: "session"` land there,
//! which gives the operator a compact record of task outcomes and account
//! boundaries next to the noisier console output.

use std::fmt;
use std::io;
use std::path::PathBuf;

use chainrun_tasks::{short_identity, Task, TransactionStatus};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Target of session log events
pub const SESSION_TARGET: &str = "session";

/// Millisecond local timestamps for the session file
struct SessionTimestamp;

impl FormatTime for SessionTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Session log rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// Hourly rotation
    Hourly,
    /// Daily rotation
    #[default]
    Daily,
    /// Single file
    Never,
}

impl RotationPolicy {
    fn to_appender_rotation(self) -> Rotation {
        match self {
            RotationPolicy::Hourly => Rotation::HOURLY,
            RotationPolicy::Daily => Rotation::DAILY,
            RotationPolicy::Never => Rotation::NEVER,
        }
    }
}

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Multi-line, human-readable
    Pretty,
    /// One line per event
    #[default]
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Session log file settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLogConfig {
    /// Directory holding the log files
    pub dir: PathBuf,

    /// File name prefix
    pub file_name: String,

    /// Rotation policy
    #[serde(default)]
    pub rotation: RotationPolicy,
}

impl Default for SessionLogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file_name: "session.log".to_string(),
            rotation: RotationPolicy::Daily,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Console output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Include the event target in console output
    #[serde(default)]
    pub include_target: bool,

    /// Session log file, disabled when absent
    #[serde(default)]
    pub session_log: Option<SessionLogConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Compact,
            include_target: false,
            session_log: Some(SessionLogConfig::default()),
        }
    }
}

/// Logging error types
#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("Logging system already initialized")]
    AlreadyInitialized,

    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for logging setup
pub type LoggingResult<T> = Result<T, LoggingError>;

/// Keeps the session log writer alive; dropping it flushes pending lines
#[must_use = "dropping the guard stops the session log writer"]
pub struct LoggingGuard {
    _session: Option<WorkerGuard>,
}

/// Layer that writes only session events to `writer`
pub fn session_layer<S, W>(writer: W) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_timer(SessionTimestamp)
        .with_filter(filter_fn(|metadata| metadata.target() == SESSION_TARGET))
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig) -> LoggingResult<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LoggingError::Filter(e.to_string()))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = tracing_subscriber::fmt::layer().with_target(config.include_target);
    let console = match config.format {
        OutputFormat::Pretty => console.pretty().with_filter(env_filter).boxed(),
        OutputFormat::Compact => console.compact().with_filter(env_filter).boxed(),
        OutputFormat::Json => console.json().with_filter(env_filter).boxed(),
    };
    layers.push(console);

    let session_guard = match &config.session_log {
        Some(session) => {
            std::fs::create_dir_all(&session.dir)?;
            let appender = RollingFileAppender::new(
                session.rotation.to_appender_rotation(),
                &session.dir,
                &session.file_name,
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(session_layer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry().with(layers);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| LoggingError::AlreadyInitialized)?;
    tracing_log::LogTracer::init().map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(LoggingGuard {
        _session: session_guard,
    })
}

/// Record a task outcome, at a level matching its severity
pub fn log_task_result(identity: &str, task: &Task, status: TransactionStatus) {
    let account = short_identity(identity);
    match status {
        TransactionStatus::Success => {
            info!(target: SESSION_TARGET, %account, %task, %status, "Task finished")
        }
        TransactionStatus::InsufficientBalance
        | TransactionStatus::Failed
        | TransactionStatus::AddressNotAllowlisted
        | TransactionStatus::IncorrectNetwork => {
            error!(target: SESSION_TARGET, %account, %task, %status, "Task finished")
        }
        _ => warn!(target: SESSION_TARGET, %account, %task, %status, "Task finished"),
    }
}

pub fn log_session_started(accounts: usize, resumed: bool) {
    info!(target: SESSION_TARGET, accounts, resumed, "Session started");
}

pub fn log_session_finished() {
    info!(target: SESSION_TARGET, "Session finished");
}

pub fn log_account_started(identity: &str, index: usize, total: usize) {
    info!(
        target: SESSION_TARGET,
        account = %short_identity(identity),
        position = index + 1,
        total,
        "Account started"
    );
}

pub fn log_account_finished(identity: &str) {
    info!(target: SESSION_TARGET, account = %short_identity(identity), "Account finished");
}

pub fn log_account_skipped(identity: &str, reason: &str) {
    warn!(target: SESSION_TARGET, account = %short_identity(identity), reason, "Account skipped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chainrun_tasks::ModuleName;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    fn capture_session<F: FnOnce()>(f: F) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::registry().with(session_layer(move || writer.clone()));
        tracing::subscriber::with_default(subscriber, f);
        capture.contents()
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, OutputFormat::Compact);
        assert_eq!(config.session_log.unwrap().rotation, RotationPolicy::Daily);
    }

    #[test]
    fn test_logging_config_deserializes_with_defaults() {
        let config: LoggingConfig = serde_json::from_str(r#"{"level": "debug", "format": "json"}"#).unwrap();
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.session_log.is_none());
    }

    #[test]
    fn test_session_layer_keeps_only_session_events() {
        let output = capture_session(|| {
            info!("console only");
            log_session_started(3, false);
        });
        assert!(output.contains("Session started"));
        assert!(output.contains("accounts=3"));
        assert!(!output.contains("console only"));
    }

    #[test]
    fn test_task_result_levels() {
        let task = Task::new(ModuleName::Dmail);
        let identity = "0x0123456789abcdef0123456789abcdef";

        let output = capture_session(|| log_task_result(identity, &task, TransactionStatus::Success));
        assert!(output.contains(" INFO "));
        assert!(output.contains("0x012345...89abcdef"));
        assert!(!output.contains(identity));

        let output = capture_session(|| log_task_result(identity, &task, TransactionStatus::Failed));
        assert!(output.contains("ERROR"));

        let output = capture_session(|| log_task_result(identity, &task, TransactionStatus::NoLiquidities));
        assert!(output.contains(" WARN "));
        assert!(output.contains("NO_LIQUIDITIES"));
    }
}
