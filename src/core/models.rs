//! 统一数据模型定义
//!
//! Data shared between the state store, the controllers and the status reporter.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// The application instance owned by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisedProcess {
    pub pid: u32,
    pub listen_port: u16,
    pub started_at: DateTime<Utc>,
}

impl SupervisedProcess {
    pub fn uptime(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.started_at)
    }
}

/// Lifecycle of the supervised process within one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Absent,
    Starting,
    Running,
    Stopping,
}

impl ProcessState {
    /// Legal transitions of the supervisor state machine
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Absent, Starting)
                | (Starting, Running)
                | (Starting, Absent)
                | (Running, Stopping)
                | (Stopping, Absent)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessState::Absent => "absent",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// Application state as seen by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    Running,
    Stopped,
    /// No live recorded process but the listen port is held by someone else
    PortConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyState {
    Running,
    Stopped,
}

/// A process found listening on the configured port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PortHolder {
    pub pid: u32,
    pub name: String,
}

impl fmt::Display for PortHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (PID {})", self.name, self.pid)
    }
}

/// Point-in-time view computed on every status query; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: AppState,
    pub pid: Option<u32>,
    pub dependency_state: DependencyState,
    pub listen_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Recorded pid that is no longer alive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_pid: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub port_holders: Vec<PortHolder>,
}

/// Result of bringing the dependency up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyReadiness {
    Ready,
    /// Started (or already running) but the readiness probe never succeeded
    DegradedTimeout { waited: Duration },
}

impl DependencyReadiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, DependencyReadiness::Ready)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyStopOutcome {
    Graceful,
    /// Compose stop failed, container removed forcefully
    Forced,
    /// Both attempts failed; the command itself still succeeds
    Failed { message: String },
}

/// How the recorded process went away during `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    Graceful,
    Forced,
    /// Still present after SIGKILL (uninterruptible sleep, foreign uid, ...)
    Survived,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_allows_only_lifecycle_edges() {
        use ProcessState::*;
        assert!(Absent.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Starting.can_transition_to(Absent));
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Absent));

        assert!(!Absent.can_transition_to(Running));
        assert!(!Running.can_transition_to(Starting));
        assert!(!Stopping.can_transition_to(Running));
    }

    #[test]
    fn snapshot_serializes_compactly() {
        let snapshot = StatusSnapshot {
            state: AppState::PortConflict,
            pid: None,
            dependency_state: DependencyState::Stopped,
            listen_port: 10770,
            started_at: None,
            stale_pid: Some(4321),
            port_holders: vec![PortHolder {
                pid: 77,
                name: "nc".to_string(),
            }],
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "port_conflict");
        assert_eq!(json["dependency_state"], "stopped");
        assert_eq!(json["stale_pid"], 4321);
        assert_eq!(json["port_holders"][0]["name"], "nc");
        assert!(json.get("started_at").is_none());
    }

    #[test]
    fn uptime_is_measured_from_start() {
        let started_at = Utc::now() - chrono::Duration::seconds(90);
        let process = SupervisedProcess {
            pid: 1,
            listen_port: 10770,
            started_at,
        };
        assert!(process.uptime(Utc::now()).num_seconds() >= 90);
    }
}
