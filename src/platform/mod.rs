//! Platform-specific process primitives
//!
//! Only Unix is supported for supervision; other targets get inert fallbacks
//! so the crate still builds.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::{prepare_detached, process_alive, send_signal};

/// Signals the supervisor sends to processes it terminates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    /// SIGTERM
    Terminate,
    /// SIGKILL
    Kill,
}

pub fn current_pid() -> u32 {
    std::process::id()
}

#[cfg(not(unix))]
pub fn prepare_detached(_cmd: &mut std::process::Command) {}

#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
    false
}

#[cfg(not(unix))]
pub fn send_signal(_pid: u32, _sig: TermSignal) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "process signalling is only supported on Unix",
    ))
}
