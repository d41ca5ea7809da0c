//! Process controller
//!
//! Owns the lifecycle of the application process: guarded start (detached or
//! attached), SIGTERM-then-SIGKILL stop with orphan port reclamation, and
//! restart. The state store is written only from here.

use crate::config::Settings;
use crate::core::models::{
    DependencyReadiness, PortHolder, ProcessState, StatusSnapshot, SupervisedProcess,
    TerminationOutcome,
};
use crate::core::poll::PollPolicy;
use crate::dependency::{ContainerRuntime, DependencyController, DockerCompose};
use crate::error::{SupervisorError, SupervisorResult};
use crate::platform::{self, TermSignal};
use crate::ports;
use crate::probe::HealthProber;
use crate::signal;
use crate::status::StatusReporter;
use crate::storage::{PidFileStore, StateStore};
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tracing::{debug, info, warn};

/// Checks after SIGKILL and while waiting for the port to be released
const SHORT_CHECKS: u32 = 4;

/// Outcome of a detached start.
#[derive(Debug, Clone)]
pub struct StartReport {
    pub process: SupervisedProcess,
    pub dependency: DependencyReadiness,
    /// Dead pid found in the state store and purged before launching
    pub stale_pid: Option<u32>,
    /// The application bound its port within the grace window
    pub port_bound: bool,
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoppedProcess {
    pub pid: u32,
    pub outcome: TerminationOutcome,
}

/// Outcome of a stop; every field describes something that was done, not an error.
#[derive(Debug, Clone, Default)]
pub struct StopReport {
    pub stopped: Option<StoppedProcess>,
    pub stale_pid: Option<u32>,
    /// Foreign listeners on the port that were killed
    pub reclaimed: Vec<PortHolder>,
    pub port_free: bool,
}

impl StopReport {
    /// Nothing was running and nothing needed cleaning up.
    pub fn was_idle(&self) -> bool {
        self.stopped.is_none() && self.stale_pid.is_none() && self.reclaimed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RestartReport {
    pub stop: StopReport,
    pub start: StartReport,
}

/// Everything checked before a launch, in either mode.
struct Preflight {
    program: PathBuf,
    args: Vec<String>,
    stale_pid: Option<u32>,
    dependency: DependencyReadiness,
}

pub struct Supervisor<S, R> {
    settings: Settings,
    store: S,
    dependency: DependencyController<R>,
}

impl Supervisor<PidFileStore, DockerCompose> {
    /// Production wiring: pid file from settings, Docker CLI runtime.
    pub fn from_settings(settings: Settings) -> SupervisorResult<Self> {
        let store = PidFileStore::new(&settings.pid_file);
        Self::with_parts(settings, store, DockerCompose::new())
    }
}

impl<S: StateStore, R: ContainerRuntime> Supervisor<S, R> {
    pub fn with_parts(settings: Settings, store: S, runtime: R) -> SupervisorResult<Self> {
        let dependency = DependencyController::new(
            runtime,
            HealthProber::new(settings.probe_timeout())?,
            settings.dependency_handle()?,
            settings.dependency_wait(),
            settings.dependency_poll(),
        );
        Ok(Self {
            settings,
            store,
            dependency,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dependency(&self) -> &DependencyController<R> {
        &self.dependency
    }

    pub fn status_reporter(&self) -> StatusReporter<'_, S> {
        StatusReporter::new(&self.store, self.settings.api_port)
    }

    pub async fn status(&self) -> StatusSnapshot {
        self.status_reporter().snapshot(&self.dependency).await
    }

    /// Launch the application detached from this terminal.
    pub async fn start(&self) -> SupervisorResult<StartReport> {
        let preflight = self.preflight().await?;
        let port = self.settings.api_port;
        transition(ProcessState::Absent, ProcessState::Starting);

        let log_file = &self.settings.log_file;
        let stdout = open_log(log_file)?;
        let stderr = stdout
            .try_clone()
            .map_err(|err| SupervisorError::process("cannot duplicate log file handle", err))?;

        let mut command = std::process::Command::new(&preflight.program);
        command
            .args(&preflight.args)
            .envs(self.settings.app_env())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        platform::prepare_detached(&mut command);

        let mut child = command
            .spawn()
            .map_err(|err| self.spawn_error(&preflight.program, err))?;
        let pid = child.id();
        let started_at = Utc::now();

        if let Err(err) = self.store.write(pid) {
            // an unrecorded instance could never be stopped again
            let _ = platform::send_signal(pid, TermSignal::Kill);
            let _ = child.wait();
            return Err(err);
        }
        info!(pid, port, log = %log_file.display(), "application launched");

        let mut early_exit: Option<ExitStatus> = None;
        let grace = PollPolicy::new(self.settings.start_check_interval(), self.settings.start_grace());
        let outcome = grace
            .until(|| match child.try_wait() {
                Ok(Some(status)) => {
                    early_exit = Some(status);
                    true
                }
                Ok(None) => ports::port_in_use(port),
                Err(err) => {
                    debug!(pid, error = %err, "cannot poll child status");
                    false
                }
            })
            .await;

        if let Some(status) = early_exit {
            transition(ProcessState::Starting, ProcessState::Absent);
            self.store.clear()?;
            warn!(pid, %status, "application exited during startup");
            return Err(SupervisorError::LaunchFailed {
                status: status.to_string(),
                log_path: log_file.clone(),
            });
        }

        transition(ProcessState::Starting, ProcessState::Running);
        debug!(pid, attempts = outcome.attempts, "start grace check passed");

        Ok(StartReport {
            process: SupervisedProcess {
                pid,
                listen_port: port,
                started_at,
            },
            dependency: preflight.dependency,
            stale_pid: preflight.stale_pid,
            port_bound: outcome.satisfied,
            log_file: log_file.clone(),
        })
    }

    /// Run the application attached to this terminal until it exits.
    ///
    /// Returns the application's exit code. The state record is cleared on exit.
    pub async fn start_foreground(&self) -> SupervisorResult<i32> {
        let preflight = self.preflight().await?;
        transition(ProcessState::Absent, ProcessState::Starting);

        let mut child = tokio::process::Command::new(&preflight.program)
            .args(&preflight.args)
            .envs(self.settings.app_env())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| self.spawn_error(&preflight.program, err))?;

        let pid = child.id().ok_or_else(|| SupervisorError::Process {
            message: "application exited before its pid could be recorded".to_string(),
            source: None,
        })?;
        if let Err(err) = self.store.write(pid) {
            let _ = child.kill().await;
            return Err(err);
        }
        transition(ProcessState::Starting, ProcessState::Running);
        info!(pid, port = self.settings.api_port, "application running in foreground");

        let guard = signal::install(pid)
            .map_err(|err| SupervisorError::process("cannot install signal forwarding", err))?;
        let waited = child.wait().await;
        drop(guard);

        transition(ProcessState::Running, ProcessState::Stopping);
        self.store.clear()?;
        transition(ProcessState::Stopping, ProcessState::Absent);

        let status =
            waited.map_err(|err| SupervisorError::process("failed to wait for application", err))?;
        info!(pid, %status, "application exited");
        Ok(exit_code_of(status))
    }

    /// Stop the recorded process, reclaim the listen port and clear the record.
    ///
    /// Safe to call when nothing is running.
    pub async fn stop(&self) -> SupervisorResult<StopReport> {
        let mut report = StopReport::default();

        match self.store.read() {
            Some(record) if platform::process_alive(record.pid) => {
                transition(ProcessState::Running, ProcessState::Stopping);
                let outcome = self.terminate(record.pid).await?;
                report.stopped = Some(StoppedProcess {
                    pid: record.pid,
                    outcome,
                });
            }
            Some(record) => {
                warn!(pid = record.pid, "recorded process is gone, clearing stale record");
                report.stale_pid = Some(record.pid);
            }
            None => debug!("no pid record"),
        }

        report.reclaimed = self.reclaim_port();
        self.store.clear()?;
        if report.stopped.is_some() {
            transition(ProcessState::Stopping, ProcessState::Absent);
        }

        let port = self.settings.api_port;
        report.port_free = PollPolicy::attempts(self.settings.stop_check_interval(), SHORT_CHECKS)
            .until(|| !ports::port_in_use(port))
            .await
            .satisfied;
        if !report.port_free {
            warn!(port, "listen port is still in use after stop");
        }

        Ok(report)
    }

    /// Stop then start. The dependency is left as it is.
    pub async fn restart(&self) -> SupervisorResult<RestartReport> {
        let stop = self.stop().await?;
        let start = self.start().await?;
        Ok(RestartReport { stop, start })
    }

    async fn preflight(&self) -> SupervisorResult<Preflight> {
        let stale_pid = match self.store.read() {
            Some(record) if platform::process_alive(record.pid) => {
                return Err(SupervisorError::RunningConflict { pid: record.pid });
            }
            Some(record) => {
                warn!(pid = record.pid, "purging stale pid record");
                self.store.clear()?;
                Some(record.pid)
            }
            None => None,
        };

        let (name, args) = self.settings.app_program();
        let program = which::which(&name)
            .map_err(|_| SupervisorError::AppExecutableMissing { program: name.clone() })?;

        let port = self.settings.api_port;
        if ports::port_in_use(port) {
            let holders = ports::port_holders(port);
            warn!(port, holders = holders.len(), "listen port is held by another process");
            return Err(SupervisorError::PortConflict { port, holders });
        }

        let dependency = self.dependency.ensure_running().await?;
        if let DependencyReadiness::DegradedTimeout { waited } = dependency {
            if self.settings.require_dependency {
                return Err(SupervisorError::DependencyNotReady {
                    name: self.dependency.handle().name.clone(),
                    waited_secs: waited.as_secs(),
                });
            }
            warn!(
                waited_secs = waited.as_secs(),
                "starting without a ready dependency"
            );
        }

        Ok(Preflight {
            program,
            args,
            stale_pid,
            dependency,
        })
    }

    async fn terminate(&self, pid: u32) -> SupervisorResult<TerminationOutcome> {
        platform::send_signal(pid, TermSignal::Terminate)
            .map_err(|err| SupervisorError::process(format!("cannot signal PID {pid}"), err))?;

        let interval = self.settings.stop_check_interval();
        let graceful = PollPolicy::attempts(interval, self.settings.stop_checks)
            .until(|| !platform::process_alive(pid))
            .await;
        if graceful.satisfied {
            info!(pid, "application stopped");
            return Ok(TerminationOutcome::Graceful);
        }

        warn!(pid, "application ignored SIGTERM, sending SIGKILL");
        platform::send_signal(pid, TermSignal::Kill)
            .map_err(|err| SupervisorError::process(format!("cannot kill PID {pid}"), err))?;
        let forced = PollPolicy::attempts(interval, SHORT_CHECKS)
            .until(|| !platform::process_alive(pid))
            .await;
        if forced.satisfied {
            Ok(TerminationOutcome::Forced)
        } else {
            warn!(pid, "application survived SIGKILL");
            Ok(TerminationOutcome::Survived)
        }
    }

    /// Kill whatever still listens on the port; never ourselves.
    fn reclaim_port(&self) -> Vec<PortHolder> {
        let port = self.settings.api_port;
        let own_pid = platform::current_pid();
        let mut reclaimed = Vec::new();

        for holder in ports::port_holders(port) {
            if holder.pid == own_pid {
                continue;
            }
            warn!(port, pid = holder.pid, name = %holder.name, "reclaiming port from orphaned process");
            match platform::send_signal(holder.pid, TermSignal::Kill) {
                Ok(()) => reclaimed.push(holder),
                Err(err) => warn!(pid = holder.pid, error = %err, "cannot kill port holder"),
            }
        }
        reclaimed
    }

    fn spawn_error(&self, program: &Path, err: io::Error) -> SupervisorError {
        if err.kind() == io::ErrorKind::NotFound {
            SupervisorError::AppExecutableMissing {
                program: program.display().to_string(),
            }
        } else {
            SupervisorError::process(format!("cannot launch {}", program.display()), err)
        }
    }
}

fn transition(from: ProcessState, to: ProcessState) {
    debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
    debug!(from = %from, to = %to, "process state");
}

fn open_log(path: &Path) -> SupervisorResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| SupervisorError::process("cannot create log directory", err))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            SupervisorError::process(format!("cannot open log file {}", path.display()), err)
        })
}

fn exit_code_of(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(1)
}
