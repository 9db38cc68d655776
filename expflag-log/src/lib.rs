//! Expflag Diagnostic Logging
//!
//! Every diagnostic the flag store produces (fatal startup errors, recoverable
//! config-line problems, lookup warnings, dumps) goes through this crate.
//! Messages are filtered by level and handed to a process-wide [`Sink`].
//!
//! # Usage
//!
//! ```rust
//! use expflag_log::{debug, info, warn, error, fatal};
//!
//! info!("loaded {} experiments", 3);
//! warn!(target: "expflag::parser", "line {}: missing '='", 12);
//! ```
//!
//! # Capturing diagnostics
//!
//! ```rust
//! use std::sync::Arc;
//! use expflag_log::{MemorySink, Level};
//!
//! let sink = Arc::new(MemorySink::new());
//! let previous = expflag_log::set_sink(sink.clone());
//! expflag_log::warn!(target: "doc::capture", "unknown experiment");
//! expflag_log::set_sink(previous);
//!
//! assert_eq!(sink.count_for("doc::capture", Level::Warn), 1);
//! ```
//!
//! # Environment Variables
//!
//! - `EXPFLAG_DEBUG=1` - Enable debug logging
//! - `EXPFLAG_LOG_LEVEL=trace|debug|info|warn|error|fatal|off` - Set log level
//! - `EXPFLAG_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `EXPFLAG_LOG_TIMESTAMPS=1|0` - Include timestamps
//! - `EXPFLAG_LOG_MODULE=1|0` - Include the record target

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::env;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};

// ============================================================================
// Log Levels
// ============================================================================

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    /// Trace level (most verbose)
    Trace = 0,
    /// Debug level
    Debug = 1,
    /// Info level
    Info = 2,
    /// Warning level, used for recoverable problems
    Warn = 3,
    /// Error level
    Error = 4,
    /// Startup errors that break the registry's invariants
    Fatal = 5,
    /// Off (no logging)
    Off = 6,
}

impl Level {
    /// Get level from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "fatal" | "critical" => Some(Level::Fatal),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Get level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
            Level::Off => "OFF",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            5 => Level::Fatal,
            _ => Level::Off,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format used by [`StderrSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-field human readable line
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    /// Get format from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Global Configuration
// ============================================================================

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

static SINK: Lazy<RwLock<Arc<dyn Sink>>> = Lazy::new(|| {
    let sink: Arc<dyn Sink> = Arc::new(StderrSink::from_config(config()));
    RwLock::new(sink)
});

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether to include timestamps
    pub timestamps: bool,
    /// Whether to include the record target
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Pretty,
            timestamps: true,
            module_path: true,
        }
    }
}

/// Truthy parsing shared by every boolean environment switch.
pub fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let debug = env_flag("EXPFLAG_DEBUG").unwrap_or(false);

        let level = env::var("EXPFLAG_LOG_LEVEL")
            .ok()
            .and_then(|s| Level::from_str(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = env::var("EXPFLAG_LOG_FORMAT")
            .ok()
            .and_then(|s| Format::from_str(&s))
            .unwrap_or(Format::Pretty);

        let config = Self {
            debug,
            level,
            format,
            timestamps: env_flag("EXPFLAG_LOG_TIMESTAMPS").unwrap_or(true),
            module_path: env_flag("EXPFLAG_LOG_MODULE").unwrap_or(true),
        };

        DEBUG_ENABLED.store(config.debug, Ordering::SeqCst);
        LOG_LEVEL.store(config.level as u8, Ordering::SeqCst);

        config
    }
}

// ============================================================================
// Records and Sinks
// ============================================================================

/// A single diagnostic handed to a [`Sink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Record {
    pub fn new(level: Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            target: target.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Destination for diagnostics.
///
/// Implementations must not call back into the logging macros.
pub trait Sink: Send + Sync {
    fn emit(&self, record: &Record);
}

/// Writes records to standard error in the configured [`Format`].
#[derive(Debug, Clone)]
pub struct StderrSink {
    format: Format,
    timestamps: bool,
    module_path: bool,
}

impl StderrSink {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            timestamps: true,
            module_path: true,
        }
    }

    pub fn from_config(config: &LogConfig) -> Self {
        Self {
            format: config.format,
            timestamps: config.timestamps,
            module_path: config.module_path,
        }
    }

    /// Render a record without the trailing newline.
    pub fn render(&self, record: &Record) -> String {
        match self.format {
            Format::Pretty => self.render_pretty(record),
            Format::Compact => self.render_compact(record),
            Format::Json => render_json(record),
        }
    }

    fn render_pretty(&self, record: &Record) -> String {
        let mut line = String::new();
        if self.timestamps {
            line.push_str(&record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f ").to_string());
        }
        line.push_str(&format!("{:5} ", record.level.as_str()));
        if self.module_path && !record.target.is_empty() {
            line.push_str(&format!("[{}] ", record.target));
        }
        line.push_str(&record.message);
        line
    }

    fn render_compact(&self, record: &Record) -> String {
        let mut line = String::new();
        if self.timestamps {
            line.push_str(&record.timestamp.format("%H:%M:%S ").to_string());
        }
        line.push(record.level.as_str().chars().next().unwrap_or('?'));
        line.push(' ');
        if self.module_path && !record.target.is_empty() {
            line.push_str(&record.target);
            line.push_str(": ");
        }
        line.push_str(&record.message);
        line
    }
}

impl Sink for StderrSink {
    fn emit(&self, record: &Record) {
        let rendered = self.render(record);
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", rendered);
    }
}

#[cfg(feature = "json")]
fn render_json(record: &Record) -> String {
    use serde::Serialize;

    #[derive(Serialize)]
    struct LogEntry<'a> {
        timestamp: String,
        level: &'a str,
        target: &'a str,
        message: &'a str,
    }

    let entry = LogEntry {
        timestamp: record.timestamp.to_rfc3339(),
        level: record.level.as_str(),
        target: &record.target,
        message: &record.message,
    };

    serde_json::to_string(&entry).unwrap_or_default()
}

#[cfg(not(feature = "json"))]
fn render_json(record: &Record) -> String {
    format!(
        r#"{{"timestamp":"{}","level":"{}","target":"{}","message":"{}"}}"#,
        record.timestamp.to_rfc3339(),
        record.level.as_str(),
        escape_json(&record.target),
        escape_json(&record.message)
    )
}

#[cfg(not(feature = "json"))]
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

/// Keeps every record in memory. Used by tests and by tooling that wants to
/// inspect diagnostics after a load.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured records.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drain captured records.
    pub fn take(&self) -> Vec<Record> {
        std::mem::take(
            &mut *self
                .records
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    /// Records whose target starts with `target`.
    pub fn records_for(&self, target: &str) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|r| r.target.starts_with(target))
            .collect()
    }

    pub fn count_for(&self, target: &str, level: Level) -> usize {
        self.records_for(target)
            .iter()
            .filter(|r| r.level == level)
            .count()
    }
}

impl Sink for MemorySink {
    fn emit(&self, record: &Record) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Initialize the logging system from the environment.
///
/// Called implicitly by the first level check.
pub fn init() {
    Lazy::force(&CONFIG);
}

/// Check if debug logging is enabled.
#[inline]
pub fn is_debug_enabled() -> bool {
    init();
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Check if a log level is enabled.
#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    init();
    level != Level::Off && level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Get current log level.
pub fn current_level() -> Level {
    init();
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level at runtime.
pub fn set_level(level: Level) {
    init();
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Enable or disable debug mode at runtime.
pub fn set_debug(enabled: bool) {
    init();
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    if enabled && current_level() > Level::Debug {
        set_level(Level::Debug);
    }
}

/// Get the global configuration.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

/// Replace the process-wide sink, returning the previous one.
pub fn set_sink(sink: Arc<dyn Sink>) -> Arc<dyn Sink> {
    let mut guard = SINK.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    std::mem::replace(&mut *guard, sink)
}

/// Restore the stderr sink built from [`config`].
pub fn reset_sink() {
    set_sink(Arc::new(StderrSink::from_config(config())));
}

/// Log a message with the given level.
#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    if !is_level_enabled(level) {
        return;
    }

    let record = Record::new(level, target, message);
    let sink = SINK
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    sink.emit(&record);
}

// ============================================================================
// Macros
// ============================================================================

/// Log a trace message.
#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Trace) {
            $crate::log($crate::Level::Trace, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Trace) {
            $crate::log($crate::Level::Trace, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log a debug message.
///
/// Enabled by `EXPFLAG_DEBUG=1` or `EXPFLAG_LOG_LEVEL=debug`.
///
/// # Example
///
/// ```rust
/// use expflag_log::debug;
///
/// let sections = 4;
/// debug!("parsed {} sections", sections);
/// debug!(target: "expflag::parser", "section [{}] opened", "exp_a");
/// ```
#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_debug_enabled() || $crate::is_level_enabled($crate::Level::Debug) {
            $crate::log($crate::Level::Debug, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::is_debug_enabled() || $crate::is_level_enabled($crate::Level::Debug) {
            $crate::log($crate::Level::Debug, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log an info message.
#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Info) {
            $crate::log($crate::Level::Info, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Info) {
            $crate::log($crate::Level::Info, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log a warning message.
#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Warn) {
            $crate::log($crate::Level::Warn, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Warn) {
            $crate::log($crate::Level::Warn, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log an error message.
#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Error) {
            $crate::log($crate::Level::Error, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Error) {
            $crate::log($crate::Level::Error, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log a fatal message.
///
/// Only reports; terminating the process is left to the caller.
#[macro_export]
macro_rules! fatal {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Fatal) {
            $crate::log($crate::Level::Fatal, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Fatal) {
            $crate::log($crate::Level::Fatal, module_path!(), &format!($($arg)+));
        }
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_record(level: Level) -> Record {
        let mut record = Record::new(level, "expflag::parser", "line 3: missing '='");
        record.timestamp = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        record
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
        assert!(Level::Fatal < Level::Off);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!(Level::from_str("debug"), Some(Level::Debug));
        assert_eq!(Level::from_str("WARNING"), Some(Level::Warn));
        assert_eq!(Level::from_str("fatal"), Some(Level::Fatal));
        assert_eq!(Level::from_str("none"), Some(Level::Off));
        assert_eq!(Level::from_str("loud"), None);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(Format::from_str("pretty"), Some(Format::Pretty));
        assert_eq!(Format::from_str("Compact"), Some(Format::Compact));
        assert_eq!(Format::from_str("json"), Some(Format::Json));
        assert_eq!(Format::from_str("xml"), None);
    }

    #[test]
    fn test_off_is_never_enabled() {
        assert!(!is_level_enabled(Level::Off));
    }

    #[test]
    fn test_render_pretty() {
        let sink = StderrSink::new(Format::Pretty);
        let line = sink.render(&fixed_record(Level::Warn));
        assert_eq!(
            line,
            "2024-01-02 03:04:05.000 WARN  [expflag::parser] line 3: missing '='"
        );
    }

    #[test]
    fn test_render_compact_without_timestamp() {
        let mut sink = StderrSink::new(Format::Compact);
        sink.timestamps = false;
        let line = sink.render(&fixed_record(Level::Fatal));
        assert_eq!(line, "F expflag::parser: line 3: missing '='");
    }

    #[test]
    fn test_render_json() {
        let sink = StderrSink::new(Format::Json);
        let line = sink.render(&fixed_record(Level::Error));
        assert!(line.starts_with('{'));
        assert!(line.contains(r#""level":"ERROR""#));
        assert!(line.contains(r#""target":"expflag::parser""#));
        assert!(line.contains("missing '='"));
    }

    #[test]
    fn test_render_json_escapes_message() {
        let sink = StderrSink::new(Format::Json);
        let record = Record::new(Level::Warn, "expflag::parser", "bad \"line\"\nnext");
        let line = sink.render(&record);
        assert!(line.contains(r#""message":"bad \"line\"\nnext""#));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_memory_sink_filters_by_target() {
        let sink = MemorySink::new();
        sink.emit(&Record::new(Level::Warn, "expflag::environment", "a"));
        sink.emit(&Record::new(Level::Info, "expflag::environment", "b"));
        sink.emit(&Record::new(Level::Warn, "expflag::parser", "c"));

        assert_eq!(sink.records().len(), 3);
        assert_eq!(sink.count_for("expflag::environment", Level::Warn), 1);
        assert_eq!(sink.records_for("expflag::parser")[0].message, "c");

        assert_eq!(sink.take().len(), 3);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_set_sink_routes_macros() {
        let sink = Arc::new(MemorySink::new());
        let previous = set_sink(sink.clone());

        warn!(target: "expflag_log::tests::routing", "value {}", 7);
        fatal!(target: "expflag_log::tests::routing", "boom");
        trace!(target: "expflag_log::tests::routing", "filtered out at default level");

        set_sink(previous);

        let captured = sink.records_for("expflag_log::tests::routing");
        assert!(captured.iter().any(|r| r.level == Level::Warn && r.message == "value 7"));
        assert!(captured.iter().any(|r| r.level == Level::Fatal && r.message == "boom"));
    }

    #[test]
    fn test_macros_compile() {
        trace!("trace message");
        debug!("debug message");
        info!("info message");
        warn!("warn message");
        error!("error message");
        fatal!("fatal message");

        debug!(target: "test", "with target");
        info!(target: "test", "with target");

        let x = 42;
        debug!("formatted: {}", x);
    }
}
