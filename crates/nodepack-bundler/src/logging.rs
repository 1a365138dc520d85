//! Subscriber setup for tools embedding nodepack (feature `logging`).
//!
//! The library itself only emits `tracing` events: unresolved dependencies
//! at `warn`, finished builds at `info`, per-import decisions at `debug`.

use std::fmt;
use std::str::FromStr;
use std::sync::Once;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directives in this variable refine the level passed to [`init_logging`].
pub const LOG_ENV: &str = "NODEPACK_LOG";

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    /// Includes every `node_modules` lookup.
    Trace,
}

impl LogLevel {
    /// Level for a CLI `-v` count, starting from `Info`.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Silent => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}' (expected silent, error, warn, info, debug or trace)")]
pub struct ParseLogLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "silent" | "off" | "none" => LogLevel::Silent,
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => return Err(ParseLogLevelError(s.to_string())),
        })
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        LevelFilter::from(*self).fmt(f)
    }
}

/// Filter for `level`, refined by `directives` (`nodepack_bundler=trace,...`).
fn build_filter(level: LogLevel, directives: Option<&str>) -> EnvFilter {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::from(level).into());
    match directives {
        Some(directives) => builder.parse_lossy(directives),
        None => builder.parse_lossy(""),
    }
}

fn install(filter: EnvFilter) {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_fmt::layer().compact().with_target(false).without_time())
            .init();
    });
}

/// Install a global subscriber at `level`. Only the first call in a process
/// has any effect.
///
/// ```rust,no_run
/// use nodepack_bundler::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Warn);
/// ```
pub fn init_logging(level: LogLevel) {
    let directives = std::env::var(LOG_ENV).ok();
    install(build_filter(level, directives.as_deref()));
}

/// Like [`init_logging`], with the level taken from `NODEPACK_LOG` or, when
/// that is unset, `RUST_LOG`.
pub fn init_logging_from_env() {
    let directives = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .ok();
    install(build_filter(LogLevel::Info, directives.as_deref()));
}
