//! Shutdown requests from SIGINT / SIGTERM.
//!
//! The handler registered here only stores `true` into an atomic. The poll loop
//! checks the flag between samples and runs cleanup outside signal context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::debug;

/// Signals that request an orderly shutdown.
pub const SHUTDOWN_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

/// A shared "please stop" flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    raised: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// A flag not connected to any signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag raised by SIGINT or SIGTERM.
    pub fn install() -> std::io::Result<Self> {
        let flag = Self::new();
        for signal in SHUTDOWN_SIGNALS {
            signal_hook::flag::register(signal, Arc::clone(&flag.raised))?;
        }
        debug!("shutdown signal handlers installed");
        Ok(flag)
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
