//! Termination signal handling.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};

/// Signals that stop the consumer.
pub const TERMINATION_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

/// Records the termination signal received by the process, if any.
///
/// The flag is only written from the signal handler and read by the consumer loop once per
/// iteration; no work is done inside the handler itself.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag {
    caught: Arc<AtomicUsize>,
}

impl ShutdownFlag {
    /// Creates a flag that is not connected to any signal. Use [`ShutdownFlag::trigger`] to set
    /// it.
    pub fn new() -> ShutdownFlag {
        ShutdownFlag::default()
    }

    /// Creates a flag set by SIGINT and SIGTERM.
    pub fn install() -> io::Result<ShutdownFlag> {
        let flag = ShutdownFlag::new();
        for signal in TERMINATION_SIGNALS {
            signal_hook::flag::register_usize(signal, Arc::clone(&flag.caught), signal as usize)?;
        }
        Ok(flag)
    }

    /// Sets the flag as if `signal` had been received.
    pub fn trigger(&self, signal: i32) {
        self.caught.store(signal as usize, Ordering::SeqCst);
    }

    /// Returns the last termination signal received, if any.
    pub fn caught(&self) -> Option<i32> {
        match self.caught.load(Ordering::SeqCst) {
            0 => None,
            signal => Some(signal as i32),
        }
    }
}

/// Returns the conventional name of a signal.
pub fn signal_name(signal: i32) -> String {
    match signal {
        SIGINT => "SIGINT".to_owned(),
        SIGTERM => "SIGTERM".to_owned(),
        other => format!("signal {}", other),
    }
}
