//! Production panic hook for capturing panics before process termination.
//!
//! Installs a global panic hook that:
//! - Logs panic info to stderr (for container logs)
//! - Captures file:line:column location
//! - Optionally reports to Sentry (behind feature flag)
//! - Calls the original hook for default behavior

use std::panic::{self, PanicHookInfo};
use std::sync::atomic::{AtomicBool, Ordering};

/// Flag to track if panic hook has been installed (for idempotency)
static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Initialize the global panic hook.
///
/// This should be called once at program startup, before the async runtime
/// is initialized. Multiple calls are safe - only the first call installs
/// the hook.
///
/// # Example
/// ```rust,ignore
/// fn main() {
///     init_panic_hook();
///     // ... rest of main
/// }
/// ```
pub(crate) fn init_panic_hook() {
    // Idempotency check - only install once
    if HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }

    let original_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        // Format panic message
        let message = format_panic_message(panic_info);

        // Log to stderr for container logs
        eprintln!("{}", message);

        // Optional Sentry integration
        #[cfg(feature = "sentry")]
        {
            sentry::capture_message(&message, sentry::Level::Fatal);
        }

        // Call original hook for default behavior (backtrace, etc.)
        original_hook(panic_info);
    }));
}

/// Format a panic message with location information.
///
/// Returns a structured message including:
/// - The panic payload (message or type)
/// - File, line, and column if available
fn format_panic_message(panic_info: &PanicHookInfo<'_>) -> String {
    let mut message = String::from("PANIC: ");

    // Get the panic payload
    if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        message.push_str(s);
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        message.push_str(s);
    } else {
        message.push_str("Unknown panic payload");
    }

    // Add location if available
    if let Some(location) = panic_info.location() {
        message.push_str(&format!(
            "\n  at {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        ));
    }

    message
}

/// Reset the hook installation flag (for testing only).
#[cfg(test)]
pub fn reset_hook_flag() {
    HOOK_INSTALLED.store(false, Ordering::SeqCst);
}


#[cfg(test)]
trait NotTrait {
    fn not(&self) -> bool;
}

#[cfg(test)]
impl NotTrait for bool {
    fn not(&self) -> bool {
        !*self
    }
}
