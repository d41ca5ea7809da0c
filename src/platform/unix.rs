use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;
use psutil::process::{Process, Status};
use std::io;
use std::process::Command;
use tracing::debug;

use super::TermSignal;

/// Detach the child from our session so it survives the supervisor exiting
/// and does not receive the terminal's SIGINT/SIGHUP.
pub fn prepare_detached(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: setsid is async-signal-safe and touches no parent state
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid().map_err(io::Error::from)?;
            Ok(())
        });
    }
}

/// Check if process is alive
///
/// Zombies count as dead. If the pid is our own child it is reaped first.
pub fn process_alive(pid: u32) -> bool {
    let Some(target) = to_pid(pid) else {
        return false;
    };

    reap_if_child(target);

    match signal::kill(target, None) {
        Ok(()) => !is_zombie(pid),
        Err(Errno::EPERM) => true, // exists, owned by someone else
        Err(_) => false,
    }
}

pub fn send_signal(pid: u32, sig: TermSignal) -> io::Result<()> {
    let target = to_pid(pid)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {pid}")))?;
    let signal = match sig {
        TermSignal::Terminate => Signal::SIGTERM,
        TermSignal::Kill => Signal::SIGKILL,
    };

    match signal::kill(target, signal) {
        Ok(()) => {
            debug!(pid, signal = %signal, "signal sent");
            Ok(())
        }
        Err(Errno::ESRCH) => Ok(()), // already gone
        Err(errno) => Err(io::Error::from(errno)),
    }
}

fn to_pid(pid: u32) -> Option<Pid> {
    // pid 0 and negative values address process groups, never a single process
    i32::try_from(pid).ok().filter(|raw| *raw > 0).map(Pid::from_raw)
}

fn reap_if_child(pid: Pid) {
    // ECHILD for anything that is not our child; nothing to do then
    let _ = waitpid(pid, Some(WaitPidFlag::WNOHANG));
}

fn is_zombie(pid: u32) -> bool {
    match Process::new(pid).and_then(|process| process.status()) {
        Ok(status) => matches!(status, Status::Zombie),
        Err(_) => false,
    }
}
