//! Read-only status view
//!
//! Computes a [`StatusSnapshot`] from the state store, the listen port and one
//! dependency probe, and renders the URLs the service is reachable on. Nothing
//! here writes state or signals processes.

use crate::config::{Settings, DOCS_PATH, UI_PATH};
use crate::core::models::{AppState, DependencyState, StatusSnapshot};
use crate::dependency::{ContainerRuntime, DependencyController};
use crate::platform;
use crate::ports;
use crate::storage::StateStore;
use get_if_addrs::{get_if_addrs, IfAddr};
use serde::Serialize;
use std::net::Ipv4Addr;
use tracing::debug;

pub struct StatusReporter<'a, S> {
    store: &'a S,
    listen_port: u16,
}

impl<'a, S: StateStore> StatusReporter<'a, S> {
    pub fn new(store: &'a S, listen_port: u16) -> Self {
        Self { store, listen_port }
    }

    /// Application state only; the dependency is reported as given.
    pub fn app_snapshot(&self, dependency_state: DependencyState) -> StatusSnapshot {
        let record = self.store.read();
        let live = record.filter(|record| platform::process_alive(record.pid));
        let stale_pid = match (record, live) {
            (Some(record), None) => {
                debug!(pid = record.pid, "recorded pid is not alive");
                Some(record.pid)
            }
            _ => None,
        };

        let mut snapshot = StatusSnapshot {
            state: AppState::Stopped,
            pid: None,
            dependency_state,
            listen_port: self.listen_port,
            started_at: None,
            stale_pid,
            port_holders: Vec::new(),
        };

        if let Some(record) = live {
            snapshot.state = AppState::Running;
            snapshot.pid = Some(record.pid);
            snapshot.started_at = Some(record.written_at);
        } else if ports::port_in_use(self.listen_port) {
            snapshot.state = AppState::PortConflict;
            snapshot.port_holders = ports::port_holders(self.listen_port);
        }
        snapshot
    }

    /// Full snapshot including one readiness probe of the dependency.
    pub async fn snapshot<R: ContainerRuntime>(
        &self,
        dependency: &DependencyController<R>,
    ) -> StatusSnapshot {
        let dependency_state = if dependency.is_ready().await {
            DependencyState::Running
        } else {
            DependencyState::Stopped
        };
        self.app_snapshot(dependency_state)
    }
}

/// Where the service can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceUrls {
    pub local: String,
    pub network: Vec<String>,
    pub ui: String,
    pub docs: String,
}

impl ServiceUrls {
    pub fn new(scheme: &str, host: &str, port: u16, addresses: &[Ipv4Addr]) -> Self {
        let wildcard = matches!(host, "0.0.0.0" | "::" | "");
        let local_host = if wildcard { "localhost" } else { host };
        let local = format!("{scheme}://{local_host}:{port}");

        let network = if wildcard {
            addresses
                .iter()
                .map(|ip| format!("{scheme}://{ip}:{port}"))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            ui: format!("{local}{UI_PATH}"),
            docs: format!("{local}{DOCS_PATH}"),
            local,
            network,
        }
    }

    pub fn discover(settings: &Settings) -> Self {
        Self::new(
            settings.scheme(),
            &settings.api_host,
            settings.api_port,
            &local_addresses(),
        )
    }
}

/// Non-loopback IPv4 addresses, skipping container bridge interfaces.
pub fn local_addresses() -> Vec<Ipv4Addr> {
    let interfaces = match get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(err) => {
            debug!(error = %err, "cannot enumerate network interfaces");
            return Vec::new();
        }
    };

    let mut ips: Vec<Ipv4Addr> = interfaces
        .into_iter()
        .filter(|iface| !is_virtual_interface(&iface.name))
        .filter_map(|iface| match iface.addr {
            IfAddr::V4(v4) if !v4.ip.is_loopback() => Some(v4.ip),
            _ => None,
        })
        .collect();

    // aliases can expose the same address twice
    ips.sort_unstable();
    ips.dedup();
    ips
}

fn is_virtual_interface(name: &str) -> bool {
    let name = name.to_lowercase();
    name == "lo"
        || ["docker", "br-", "veth", "cni", "flannel."]
            .iter()
            .any(|prefix| name.starts_with(prefix))
        || name.contains("docker")
        || name.contains("vethernet")
}
