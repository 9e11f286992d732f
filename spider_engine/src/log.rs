//! Logging system for the Spider engine
//!
//! This module provides:
//! - Customizable logger via the Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error)
//! - Colored console output by default
//! - `Console`, an injected logging handle with an explicit init/teardown
//!   lifecycle, cloned into every subsystem that logs
//! - File and line information for detailed ERROR logs

use colored::*;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging implementations
///
/// # Example
///
/// ```no_run
/// use spider_engine::spider::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::fs::File,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level (Trace, Debug, Info, Warn, Error)
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source component (e.g., "spider::arena", "spider::vulkan::device")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for detailed ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for detailed ERROR logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Very verbose debug information
    Trace,

    /// Development/debugging information
    Debug,

    /// Important informational messages
    Info,

    /// Warning messages (potential issues)
    Warn,

    /// Error messages (critical issues with file:line details)
    Error,
}

/// Default logger implementation using colored console output
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Error: `[timestamp] [ERROR] [source] message (file:line)`
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        println!("{}", format_entry(entry));
    }
}

/// Render an entry the way `DefaultLogger` prints it
pub fn format_entry(entry: &LogEntry) -> String {
    let datetime: DateTime<Local> = entry.timestamp.into();
    let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

    let severity_str = match entry.severity {
        LogSeverity::Trace => "TRACE".bright_black(),
        LogSeverity::Debug => "DEBUG".cyan(),
        LogSeverity::Info => "INFO ".green(),
        LogSeverity::Warn => "WARN ".yellow(),
        LogSeverity::Error => "ERROR".red().bold(),
    };

    let source = entry.source.bright_blue();

    if let (Some(file), Some(line)) = (entry.file, entry.line) {
        format!(
            "[{}] [{}] [{}] {} ({}:{})",
            timestamp, severity_str, source, entry.message, file, line
        )
    } else {
        format!("[{}] [{}] [{}] {}", timestamp, severity_str, source, entry.message)
    }
}

struct ConsoleState {
    logger: Option<Box<dyn Logger>>,
    min_severity: LogSeverity,
}

/// Injected logging handle
///
/// A `Console` starts either empty (`Console::new`, messages are dropped)
/// or attached (`Console::with_logger`). `init` attaches a logger, `teardown`
/// detaches it. Clones share the same state, so tearing down one handle
/// silences every subsystem that received a clone.
#[derive(Clone)]
pub struct Console {
    state: Arc<RwLock<ConsoleState>>,
}

impl Console {
    /// Create a console with no logger attached
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ConsoleState {
                logger: None,
                min_severity: LogSeverity::Trace,
            })),
        }
    }

    /// Create a console already attached to `logger`
    pub fn with_logger<L: Logger + 'static>(logger: L) -> Self {
        let console = Self::new();
        console.init(logger);
        console
    }

    /// Attach a logger, replacing any previous one
    pub fn init<L: Logger + 'static>(&self, logger: L) {
        if let Ok(mut state) = self.state.write() {
            state.logger = Some(Box::new(logger));
        }
    }

    /// Detach the logger; later messages are dropped
    pub fn teardown(&self) {
        if let Ok(mut state) = self.state.write() {
            state.logger = None;
        }
    }

    /// Whether a logger is attached
    pub fn is_active(&self) -> bool {
        self.state
            .read()
            .map(|state| state.logger.is_some())
            .unwrap_or(false)
    }

    /// Drop messages below `severity`
    pub fn set_min_severity(&self, severity: LogSeverity) {
        if let Ok(mut state) = self.state.write() {
            state.min_severity = severity;
        }
    }

    /// Log a message (used by the engine_* macros)
    pub fn log(&self, severity: LogSeverity, source: &str, message: String) {
        self.dispatch(severity, source, message, None, None);
    }

    /// Log a message with file:line information (used by engine_error!)
    pub fn log_detailed(
        &self,
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        self.dispatch(severity, source, message, Some(file), Some(line));
    }

    fn dispatch(
        &self,
        severity: LogSeverity,
        source: &str,
        message: String,
        file: Option<&'static str>,
        line: Option<u32>,
    ) {
        // A poisoned lock means a logger panicked; keep the frame loop alive
        let Ok(state) = self.state.read() else {
            return;
        };
        if severity < state.min_severity {
            return;
        }
        if let Some(logger) = state.logger.as_ref() {
            logger.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file,
                line,
            });
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("active", &self.is_active())
            .finish()
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message
///
/// ```no_run
/// # use spider_engine::{engine_trace, spider::log::Console};
/// # let console = Console::new();
/// engine_trace!(console, "spider::arena", "Entering allocate()");
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($console:expr, $source:expr, $($arg:tt)*) => {
        $console.log(
            $crate::spider::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message
#[macro_export]
macro_rules! engine_debug {
    ($console:expr, $source:expr, $($arg:tt)*) => {
        $console.log(
            $crate::spider::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message
///
/// ```no_run
/// # use spider_engine::{engine_info, spider::log::Console};
/// # let console = Console::new();
/// engine_info!(console, "spider::renderer", "Renderer initialized with {} frames in flight", 2);
/// ```
#[macro_export]
macro_rules! engine_info {
    ($console:expr, $source:expr, $($arg:tt)*) => {
        $console.log(
            $crate::spider::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message
#[macro_export]
macro_rules! engine_warn {
    ($console:expr, $source:expr, $($arg:tt)*) => {
        $console.log(
            $crate::spider::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
#[macro_export]
macro_rules! engine_error {
    ($console:expr, $source:expr, $($arg:tt)*) => {
        $console.log_detailed(
            $crate::spider::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR message and evaluate to `Error::BackendError` with the same text
///
/// ```no_run
/// # use spider_engine::{engine_err, spider::{Error, log::Console}};
/// # let console = Console::new();
/// let err: Error = engine_err!(console, "spider::vulkan", "Failed to create fence: {}", -4);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($console:expr, $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $console.log_detailed(
            $crate::spider::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::spider::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return `Err(Error::BackendError)` from the enclosing function
#[macro_export]
macro_rules! engine_bail {
    ($console:expr, $source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($console, $source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
