//! Logging for quadframe and its backends
//!
//! Messages carry a severity, a namespaced source such as
//! `"quadframe::FrameExecutor"` and, for errors raised through `qf_error!`,
//! `qf_err!` or `qf_bail!`, the file and line of the raise site. They go to
//! a single process-wide `Logger`; `DefaultLogger` prints colored lines.
//!
//! The logger is the only process-wide state in the crate. Everything
//! GPU-related lives in explicitly owned objects.

use colored::*;
use chrono::{DateTime, Local};
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;

static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Destination for log entries
///
/// Install one with `set_logger` to send quadframe output to a file, a
/// test capture or an application console.
///
/// # Example
///
/// ```no_run
/// use quadframe::log::{LogEntry, LogSeverity, Logger};
///
/// struct ErrorsToStderr;
///
/// impl Logger for ErrorsToStderr {
///     fn log(&self, entry: &LogEntry) {
///         if entry.severity == LogSeverity::Error {
///             eprintln!("{}: {}", entry.source, entry.message);
///         }
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Namespaced origin, e.g. "quadframe::DeviceContext" or "quadframe::vulkan"
    pub source: String,
    pub message: String,
    /// Raise site, set for detailed error entries only
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

/// Severity, from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogSeverity {
    /// Fixed-width label used in console output
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }
}

/// Console logger
///
/// Prints `[YYYY-MM-DD HH:MM:SS.mmm] [SEV] [source] message`, followed by
/// `(file:line)` for detailed entries. Errors are bold red, warnings yellow,
/// info green, debug cyan and trace dimmed.
pub struct DefaultLogger;

impl DefaultLogger {
    fn format_line(entry: &LogEntry) -> String {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let label = entry.severity.label();
        let severity = match entry.severity {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        };

        let mut line = format!(
            "[{}] [{}] [{}] {}",
            datetime.format("%Y-%m-%d %H:%M:%S%.3f"),
            severity,
            entry.source.bright_blue(),
            entry.message
        );
        if let (Some(file), Some(at)) = (entry.file, entry.line) {
            line.push_str(&format!(" ({}:{})", file, at));
        }
        line
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        println!("{}", Self::format_line(entry));
    }
}

fn logger_slot() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

fn dispatch(entry: LogEntry) {
    if let Ok(logger) = logger_slot().read() {
        logger.log(&entry);
    }
}

/// Replace the process-wide logger
///
/// # Example
///
/// ```no_run
/// use quadframe::log::{set_logger, DefaultLogger};
///
/// set_logger(DefaultLogger);
/// ```
pub fn set_logger<L: Logger + 'static>(logger: L) {
    if let Ok(mut slot) = logger_slot().write() {
        *slot = Box::new(logger);
    }
}

/// Go back to `DefaultLogger`
pub fn reset_logger() {
    set_logger(DefaultLogger);
}

/// Log without a raise site (`qf_trace!` to `qf_warn!`)
pub fn log(severity: LogSeverity, source: &str, message: String) {
    dispatch(LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_string(),
        message,
        file: None,
        line: None,
    });
}

/// Log with the raise site (`qf_error!`, `qf_err!`, `qf_bail!`)
pub fn log_detailed(severity: LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
    dispatch(LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_string(),
        message,
        file: Some(file),
        line: Some(line),
    });
}

// ===== LOGGING MACROS =====

/// Log a TRACE message
///
/// # Example
///
/// ```no_run
/// quadframe::qf_trace!("quadframe::FrameExecutor", "Entering state {:?}", "Recording");
/// ```
#[macro_export]
macro_rules! qf_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message
///
/// # Example
///
/// ```no_run
/// quadframe::qf_debug!("quadframe::DeviceContext", "Tier {} rejected", "1.3");
/// ```
#[macro_export]
macro_rules! qf_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message
///
/// # Example
///
/// ```no_run
/// quadframe::qf_info!("quadframe::DeviceContext", "Device created at tier {}", "1.2");
/// ```
#[macro_export]
macro_rules! qf_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message
///
/// # Example
///
/// ```no_run
/// quadframe::qf_warn!("quadframe::vulkan", "Present interval {} not supported", 0);
/// ```
#[macro_export]
macro_rules! qf_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
///
/// # Example
///
/// ```no_run
/// quadframe::qf_error!("quadframe::shader", "Compilation failed: {}", "syntax error");
/// ```
#[macro_export]
macro_rules! qf_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR message and evaluate to `Error::BackendError` carrying it
///
/// # Example
///
/// ```no_run
/// fn check(ok: bool) -> quadframe::Result<()> {
///     if !ok {
///         return Err(quadframe::qf_err!("quadframe::vulkan", "Call failed"));
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! qf_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return `Err(Error::BackendError)` from the current function
///
/// # Example
///
/// ```no_run
/// fn check(index: u32, count: u32) -> quadframe::Result<()> {
///     if index >= count {
///         quadframe::qf_bail!("quadframe::vulkan", "Index {} out of range ({})", index, count);
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! qf_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::qf_err!($source, $($arg)*))
    };
}


#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
