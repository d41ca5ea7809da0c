//! Unified error handling for kvctl
//!
//! Network and OS failures are converted into this taxonomy at the component
//! that issues them, so nothing reaches the operator as a raw transport error.
//! Conditions that are merely degraded (dependency readiness timeout, stale
//! state record, reclaimed orphan port) are reported through the command
//! reports instead and never appear here.

use crate::core::models::PortHolder;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for the supervisor
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Configuration could not be read or failed validation
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The compose tool could not be invoked at all
    #[error("Dependency tooling unavailable ({tool}): {message}")]
    DependencyTooling { tool: String, message: String },

    /// The compose tool ran but refused to start the dependency
    #[error("Dependency '{name}' failed to start: {message}")]
    DependencyStart { name: String, message: String },

    /// Strict policy only: the dependency never answered its readiness probe
    #[error("Dependency '{name}' not ready after {waited_secs}s")]
    DependencyNotReady { name: String, waited_secs: u64 },

    /// Application entry point does not resolve
    #[error("Application executable not found: {program}")]
    AppExecutableMissing { program: String },

    /// Start requested while the recorded process is alive
    #[error("Application is already running (PID {pid})")]
    RunningConflict { pid: u32 },

    /// Listen port is held by a process we did not start
    #[error("Port {port} is already in use by another process")]
    PortConflict { port: u16, holders: Vec<PortHolder> },

    /// The application exited during the start grace window
    #[error("Application exited during startup ({status})")]
    LaunchFailed { status: String, log_path: PathBuf },

    /// State record could not be written or removed
    #[error("State store error: {message} (path: {})", path.display())]
    StateStore {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<io::Error>,
    },

    /// Spawning, signalling or waiting on a process failed
    #[error("Process error: {message}")]
    Process {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Operator input that cannot be acted on
    #[error("Invalid input: {message}")]
    Validation { message: String },
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Dependency,
    Process,
    State,
    Conflict,
    Validation,
}

impl ErrorCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "Configuration",
            ErrorCategory::Dependency => "Dependency",
            ErrorCategory::Process => "Process",
            ErrorCategory::State => "State",
            ErrorCategory::Conflict => "Conflict",
            ErrorCategory::Validation => "Validation",
        }
    }
}

/// How an error is meant to be handled by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Abort the command
    Fatal,
    /// Caller may retry or proceed after reporting
    Recoverable,
    /// Operator must change the request (confirm, fix input)
    UserInput,
}

/// Rich, user-friendly error information used by the CLI.
#[derive(Debug, Clone)]
pub struct UserFacingError {
    pub title: String,
    pub message: String,
    pub hint: Option<String>,
}

/// Result type alias for convenience
pub type SupervisorResult<T> = Result<T, SupervisorError>;

impl SupervisorError {
    pub fn config<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SupervisorError::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        SupervisorError::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn state(message: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        SupervisorError::StateStore {
            message: message.into(),
            path: path.into(),
            source: Some(source),
        }
    }

    pub fn process(message: impl Into<String>, source: io::Error) -> Self {
        SupervisorError::Process {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            SupervisorError::Config { .. } => ErrorCategory::Config,
            SupervisorError::DependencyTooling { .. }
            | SupervisorError::DependencyStart { .. }
            | SupervisorError::DependencyNotReady { .. } => ErrorCategory::Dependency,
            SupervisorError::AppExecutableMissing { .. }
            | SupervisorError::LaunchFailed { .. }
            | SupervisorError::Process { .. } => ErrorCategory::Process,
            SupervisorError::StateStore { .. } => ErrorCategory::State,
            SupervisorError::RunningConflict { .. } | SupervisorError::PortConflict { .. } => {
                ErrorCategory::Conflict
            }
            SupervisorError::Validation { .. } => ErrorCategory::Validation,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::RunningConflict { .. } | SupervisorError::Validation { .. } => {
                ErrorKind::UserInput
            }
            SupervisorError::PortConflict { .. } | SupervisorError::DependencyNotReady { .. } => {
                ErrorKind::Recoverable
            }
            _ => ErrorKind::Fatal,
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Fatal => 1,
            ErrorKind::Recoverable => 3,
            ErrorKind::UserInput => 2,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            SupervisorError::Config { message, .. } => format!("Configuration problem: {}", message),
            SupervisorError::DependencyTooling { tool, message } => {
                format!("Cannot run '{}' to manage the vector database: {}", tool, message)
            }
            SupervisorError::DependencyStart { name, message } => {
                format!("Could not start dependency '{}': {}", name, message)
            }
            SupervisorError::DependencyNotReady { name, waited_secs } => format!(
                "Dependency '{}' did not become ready within {}s",
                name, waited_secs
            ),
            SupervisorError::AppExecutableMissing { program } => {
                format!("Application entry point '{}' was not found on PATH", program)
            }
            SupervisorError::RunningConflict { pid } => {
                format!("The service is already running (PID {})", pid)
            }
            SupervisorError::PortConflict { port, holders } => {
                if holders.is_empty() {
                    format!("Port {} is occupied by an unknown process", port)
                } else {
                    let owners: Vec<String> = holders.iter().map(PortHolder::to_string).collect();
                    format!("Port {} is occupied by {}", port, owners.join(", "))
                }
            }
            SupervisorError::LaunchFailed { status, log_path } => format!(
                "The service exited right after launch ({}); see {}",
                status,
                log_path.display()
            ),
            SupervisorError::StateStore { message, path, .. } => {
                format!("PID file problem at {}: {}", path.display(), message)
            }
            SupervisorError::Process { message, .. } => format!("Process problem: {}", message),
            SupervisorError::Validation { message } => {
                format!("Input validation failed: {}", message)
            }
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            SupervisorError::Config { .. } => {
                Some("Check kvctl.toml and the API_*/KVCTL_* environment variables.".to_string())
            }
            SupervisorError::DependencyTooling { .. } => Some(
                "Install Docker with the compose plugin (or docker-compose) and make sure the daemon is running."
                    .to_string(),
            ),
            SupervisorError::DependencyStart { .. } => Some(
                "Run the compose command by hand to see the full output, then retry.".to_string(),
            ),
            SupervisorError::DependencyNotReady { .. } => Some(
                "Check the container logs, or start without --strict-deps to proceed anyway."
                    .to_string(),
            ),
            SupervisorError::AppExecutableMissing { .. } => Some(
                "Activate the project's virtual environment or set KVCTL_APP_COMMAND.".to_string(),
            ),
            SupervisorError::RunningConflict { .. } => {
                Some("Use `kvctl restart` or pass --yes to restart it.".to_string())
            }
            SupervisorError::PortConflict { .. } => Some(
                "Run `kvctl stop` to reclaim the port, or change API_PORT.".to_string(),
            ),
            SupervisorError::LaunchFailed { .. } => {
                Some("Inspect the output with `kvctl logs`.".to_string())
            }
            SupervisorError::StateStore { .. } => Some(
                "Ensure the logs directory exists and is writable by this user.".to_string(),
            ),
            SupervisorError::Process { .. } => None,
            SupervisorError::Validation { .. } => Some("Run `kvctl --help` for usage.".to_string()),
        }
    }

    /// Convert into a user-facing payload with actionable hints.
    pub fn to_user_facing(&self) -> UserFacingError {
        UserFacingError {
            title: format!("{} Error", self.category().display_name()),
            message: self.user_message(),
            hint: self.hint(),
        }
    }
}
