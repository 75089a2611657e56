//! Vulkan debug messenger: routes validation layer messages into the
//! quadframe log and keeps per-severity counters.

use ash::vk;
use colored::*;
use quadframe::config::{DebugSeverity, ValidationStats};
use quadframe::log::{self, LogSeverity};
use rustc_hash::FxHashMap;
use std::ffi::{c_char, CStr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

const SOURCE: &str = "quadframe::vulkan::validation";

const ERRORS: usize = 0;
const WARNINGS: usize = 1;
const INFO: usize = 2;
const VERBOSE: usize = 3;

/// Read by the messenger callback; None once the instance is gone
static DEBUG_CONFIG: Mutex<Option<DebugConfig>> = Mutex::new(None);

static COUNTERS: [AtomicU32; 4] = [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)];

/// Occurrence count per message text
static OCCURRENCES: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// What the messenger callback reports and how it reacts to errors
#[derive(Debug, Clone, Copy)]
pub struct DebugConfig {
    pub severity: DebugSeverity,
    pub panic_on_error: bool,
    pub enable_stats: bool,
}

/// Install the callback configuration and reset the counters
pub fn init_debug_config(config: DebugConfig) {
    for counter in &COUNTERS {
        counter.store(0, Ordering::Relaxed);
    }
    *OCCURRENCES.lock().unwrap() = Some(FxHashMap::default());
    *DEBUG_CONFIG.lock().unwrap() = Some(config);
}

/// Forget the configuration; later callbacks are ignored
pub fn cleanup_debug_config() {
    *DEBUG_CONFIG.lock().unwrap() = None;
    *OCCURRENCES.lock().unwrap() = None;
}

/// Counters collected since the last `init_debug_config`
pub fn get_validation_stats() -> ValidationStats {
    ValidationStats {
        errors: COUNTERS[ERRORS].load(Ordering::Relaxed),
        warnings: COUNTERS[WARNINGS].load(Ordering::Relaxed),
        info: COUNTERS[INFO].load(Ordering::Relaxed),
        verbose: COUNTERS[VERBOSE].load(Ordering::Relaxed),
    }
}

/// Print the validation counters to stdout
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();
    if stats.total() == 0 {
        println!("\n{}", "Vulkan validation: no messages".green().bold());
        return;
    }

    println!("\n{}", "--- Vulkan validation ---".bright_blue().bold());
    let rows = [
        (stats.errors, "errors".red().bold()),
        (stats.warnings, "warnings".yellow().bold()),
        (stats.info, "info".cyan()),
        (stats.verbose, "verbose".bright_black()),
    ];
    for (count, label) in rows.iter().filter(|(count, _)| *count > 0) {
        println!("  {:<10} {}", label, count);
    }
    println!("  {:<10} {}", "total".white().bold(), stats.total());

    if let Some(occurrences) = OCCURRENCES.lock().unwrap().as_ref() {
        let repeated = occurrences.values().filter(|&&count| count > 1).count();
        if repeated > 0 {
            println!("  {} distinct message(s) repeated", repeated);
        }
    }
}

/// Messenger severity mask matching a configured severity
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let errors = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    let warnings = errors | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
    match severity {
        DebugSeverity::ErrorsOnly => errors,
        DebugSeverity::ErrorsAndWarnings => warnings,
        DebugSeverity::All => {
            warnings
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

/// Log severity and counter slot for a messenger severity
fn classify(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> (LogSeverity, usize) {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        (LogSeverity::Error, ERRORS)
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        (LogSeverity::Warn, WARNINGS)
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        (LogSeverity::Info, INFO)
    } else {
        (LogSeverity::Trace, VERBOSE)
    }
}

fn message_kind(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn text_or<'a>(ptr: *const c_char, fallback: &'a str) -> &'a str {
    if ptr.is_null() {
        return fallback;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or("<invalid UTF-8>")
}

/// Vulkan debug messenger callback
///
/// # Safety
///
/// Called by the Vulkan loader with valid callback data.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let Some(config) = *DEBUG_CONFIG.lock().unwrap() else {
        return vk::FALSE;
    };
    if !severity_flags(config.severity).intersects(message_severity) {
        return vk::FALSE;
    }

    let callback_data = unsafe { *p_callback_data };
    let message_id = unsafe { text_or(callback_data.p_message_id_name, "unknown") };
    let message = unsafe { text_or(callback_data.p_message, "") };
    let (severity, slot) = classify(message_severity);
    let kind = message_kind(message_type);

    let mut occurrences = 1;
    if config.enable_stats {
        COUNTERS[slot].fetch_add(1, Ordering::Relaxed);
        let mut seen = OCCURRENCES.lock().unwrap();
        let count = seen.get_or_insert_with(FxHashMap::default).entry(message.to_string()).or_insert(0);
        *count += 1;
        occurrences = *count;
    }

    let repeat = if occurrences > 1 { format!(" (x{})", occurrences) } else { String::new() };
    log::log(severity, SOURCE, format!("[{}]{} {}: {}", kind, repeat, message_id, message));

    if config.panic_on_error && severity == LogSeverity::Error {
        panic!("Vulkan validation error {} ({}): {}", message_id, kind, message);
    }

    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
