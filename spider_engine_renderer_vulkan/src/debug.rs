/// Vulkan Debug Messenger - routes validation layer messages to the Console
///
/// The messenger owns a boxed state handed to the driver as callback user
/// data, so every device logs to its own console and keeps its own
/// statistics. Nothing here is global.

use ash::vk;
use colored::*;
use rustc_hash::FxHashMap;
use spider_engine::spider::log::{Console, LogSeverity};
use spider_engine::spider::{Error, Result};
use spider_engine::engine_error;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

const SOURCE: &str = "spider::vulkan::validation";

/// Counts of validation messages received, per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

/// Thread-safe validation statistics tracker
#[derive(Default)]
struct StatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl StatsTracker {
    fn record(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }
}

/// State reachable from the callback
struct MessengerState {
    console: Console,
    stats: StatsTracker,
    /// Occurrences per message id, for repeat markers
    repeats: Mutex<FxHashMap<String, u32>>,
}

impl MessengerState {
    fn handle(
        &self,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT,
        message_id: &str,
        message: &str,
    ) {
        self.stats.record(severity);

        let occurrences = match self.repeats.lock() {
            Ok(mut repeats) => {
                let count = repeats.entry(message_id.to_string()).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => 1,
        };

        self.console.log(
            log_severity(severity),
            SOURCE,
            format_message(message_type, message_id, message, occurrences),
        );
    }
}

/// Map a Vulkan message severity to a console severity
pub(crate) fn log_severity(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Debug
    } else {
        LogSeverity::Trace
    }
}

pub(crate) fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// `[Validation] VUID-...: text`, with ` [x3]` appended from the second occurrence on
pub(crate) fn format_message(
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    message_id: &str,
    message: &str,
    occurrences: u32,
) -> String {
    let mut line = format!("[{}] {}: {}", message_type_name(message_type), message_id, message);
    if occurrences > 1 {
        line.push_str(&format!(" [x{}]", occurrences));
    }
    line
}

unsafe fn c_str_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        std::borrow::Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// Vulkan debug messenger callback
unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || user_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = *p_callback_data;
    let state = &*(user_data as *const MessengerState);

    let message_id = c_str_or(callback_data.p_message_id_name, "Unknown");
    let message = c_str_or(callback_data.p_message, "No message");
    state.handle(message_severity, message_type, &message_id, &message);

    vk::FALSE // Don't abort Vulkan execution
}

/// Debug utils messenger and the state its callback reads
pub(crate) struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
    state: Box<MessengerState>,
}

impl DebugMessenger {
    pub(crate) fn new(entry: &ash::Entry, instance: &ash::Instance, console: Console) -> Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let state = Box::new(MessengerState {
            console: console.clone(),
            stats: StatsTracker::default(),
            repeats: Mutex::new(FxHashMap::default()),
        });

        let messenger = unsafe {
            let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                        | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(vulkan_debug_callback))
                .user_data(state.as_ref() as *const MessengerState as *mut std::os::raw::c_void);

            loader.create_debug_utils_messenger(&debug_info, None).map_err(|e| {
                engine_error!(console, SOURCE, "Failed to create debug messenger: {:?}", e);
                Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
            })?
        };

        Ok(Self { loader, messenger, state })
    }

    pub(crate) fn stats(&self) -> ValidationStats {
        self.state.stats.snapshot()
    }

    /// Print a colored summary of the validation messages received so far
    pub(crate) fn print_report(&self) {
        let stats = self.stats();

        if stats.total() == 0 {
            println!("\n{}", "No validation messages".green().bold());
            return;
        }

        println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
        if stats.errors > 0 {
            println!("  {} {}", "Errors:".red().bold(), stats.errors);
        }
        if stats.warnings > 0 {
            println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
        }
        if stats.info > 0 {
            println!("  {} {}", "Info:".cyan(), stats.info);
        }
        if stats.verbose > 0 {
            println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
        }
        println!("  {} {}", "Total:".white().bold(), stats.total());

        if let Ok(repeats) = self.state.repeats.lock() {
            let repeated = repeats.values().filter(|&&count| count > 1).count();
            if repeated > 0 {
                println!("\n  {} message id(s) appeared multiple times", repeated);
            }
        }
        println!("{}\n", "====================================".bright_blue().bold());
    }

    /// Destroy the messenger. The instance must still be alive.
    pub(crate) unsafe fn destroy(self) {
        self.loader.destroy_debug_utils_messenger(self.messenger, None);
        // state is dropped after the driver stopped calling back
    }
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
