//! Ctrl+C handling.
//!
//! The handler flips an `AtomicBool` that the binary hands to the
//! [`Trawler`](crate::trawler::Trawler) as its stop flag, so an interrupt
//! finishes in-flight files, skips the rest of the queue, and still lets the
//! cache be flushed before exiting with code 130.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared flag set when shutdown is requested.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag itself, for sharing with the trawler.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler, or reuse the one already installed.
///
/// A reused handler is reset first. If another component already owns the
/// Ctrl+C hook, an unhooked handler is returned; it still works for manual
/// [`request_shutdown`](ShutdownHandler::request_shutdown) calls.
///
/// # Errors
///
/// Currently always succeeds; the `Result` leaves room for platforms where
/// no fallback is acceptable.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing current images...");
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    });

    if let Err(e) = installed {
        log::debug!("Ctrl+C handler unavailable ({}), using unhooked handler", e);
    }

    // Another thread may have won the race; everyone shares its handler.
    let shared = GLOBAL_HANDLER.get_or_init(|| handler);
    Ok(shared.clone())
}
