//! Listen-port inspection
//!
//! Occupancy is decided by trying to bind the wildcard address; holder
//! identification is best effort through the OS socket tables.

use crate::core::models::PortHolder;
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, TcpListener};
use tracing::debug;

/// Whether something is bound to `port` on any local interface.
pub fn port_in_use(port: u16) -> bool {
    if port == 0 {
        return false;
    }
    // Binding 0.0.0.0 also conflicts with listeners on specific addresses
    match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
        Ok(listener) => {
            drop(listener);
            false
        }
        Err(err) => {
            debug!(port, error = %err, "port bind probe failed");
            true
        }
    }
}

/// Processes listening on `port`, ordered by pid. Empty when none are found
/// or the socket tables cannot be read.
pub fn port_holders(port: u16) -> Vec<PortHolder> {
    let listeners = match listeners::get_all() {
        Ok(listeners) => listeners,
        Err(err) => {
            debug!(port, error = %err, "cannot enumerate listening sockets");
            return Vec::new();
        }
    };

    let holders: BTreeMap<u32, String> = listeners
        .into_iter()
        .filter(|listener| listener.socket.port() == port)
        .map(|listener| (listener.process.pid, listener.process.name))
        .collect();

    holders
        .into_iter()
        .map(|(pid, name)| PortHolder { pid, name })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn free_port() -> u16 {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    #[serial]
    fn bound_port_is_in_use() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(port_in_use(port));

        drop(listener);
        assert!(!port_in_use(port));
    }

    #[test]
    #[serial]
    fn free_port_has_no_holders() {
        let port = free_port();
        assert!(!port_in_use(port));
        assert!(port_holders(port).is_empty());
    }

    #[test]
    fn port_zero_is_never_in_use() {
        assert!(!port_in_use(0));
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn holder_of_own_listener_is_current_process() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let holders = port_holders(port);
        assert!(holders.iter().any(|h| h.pid == std::process::id()));
    }
}
