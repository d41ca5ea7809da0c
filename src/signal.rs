//! Signal forwarding for the attached (foreground) launch mode.
//!
//! While a [`SignalGuard`] is alive, SIGINT and SIGTERM delivered to the
//! supervisor are relayed to the child as SIGTERM instead of killing us, so the
//! state record can still be cleared once the child exits.

use crate::platform::{self, TermSignal};
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::task::JoinHandle;
use tracing::{info, warn};

static CHILD_PID: AtomicU32 = AtomicU32::new(0);

pub struct SignalGuard {
    task: JoinHandle<()>,
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        CHILD_PID.store(0, Ordering::SeqCst);
        self.task.abort();
    }
}

/// Start relaying termination signals to `child_pid`. Must be called from
/// within a tokio runtime.
pub fn install(child_pid: u32) -> io::Result<SignalGuard> {
    CHILD_PID.store(child_pid, Ordering::SeqCst);

    #[cfg(unix)]
    let task = {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            loop {
                let name = tokio::select! {
                    _ = interrupt.recv() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                };
                forward(name);
            }
        })
    };

    #[cfg(not(unix))]
    let task = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            forward("Ctrl-C");
        }
    });

    Ok(SignalGuard { task })
}

fn forward(received: &str) {
    let pid = CHILD_PID.load(Ordering::SeqCst);
    if pid == 0 {
        return;
    }
    info!(pid, signal = received, "forwarding termination to application");
    if let Err(err) = platform::send_signal(pid, TermSignal::Terminate) {
        warn!(pid, error = %err, "failed to forward signal");
    }
}
