//! kvctl Library
//!
//! Service supervisor for the KoalaqVision inference API: pid-file tracking,
//! vector-database dependency control through docker compose, port and
//! readiness probing, and the `kvctl` command surface.

pub mod commands;
pub mod config;
pub mod core;
pub mod dependency;
pub mod error;
pub mod platform;
pub mod ports;
pub mod probe;
pub mod signal;
pub mod status;
pub mod storage;
pub mod supervisor;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{CommandLine, DependencyHandle, Settings};
pub use crate::core::models::*;
pub use dependency::{ContainerRuntime, DependencyController, DockerCompose};
pub use error::{SupervisorError, SupervisorResult};
pub use status::{ServiceUrls, StatusReporter};
pub use storage::{PidFileStore, PidRecord, StateStore};
pub use supervisor::{RestartReport, StartReport, StopReport, StoppedProcess, Supervisor};
