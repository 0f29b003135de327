//! Network reachability checks.
//!
//! The synchronizer asks [`Connectivity::is_online`] before every remote
//! attempt. The answer is a snapshot; a request may still fail afterwards.

use shared::config::ConnectivityConfig;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// "Is the network reachable now"
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Probe by opening a TCP connection to the API host
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn from_config(config: &ConnectivityConfig) -> Self {
        Self::new(
            config.probe_host.clone(),
            config.probe_port,
            Duration::from_millis(config.probe_timeout_ms),
        )
    }
}

impl Connectivity for TcpProbe {
    fn is_online(&self) -> bool {
        let addrs = match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(host = %self.host, error = %e, "Connectivity probe: lookup failed");
                return false;
            }
        };

        for addr in addrs {
            if TcpStream::connect_timeout(&addr, self.timeout).is_ok() {
                return true;
            }
        }

        debug!(host = %self.host, port = self.port, "Connectivity probe: unreachable");
        false
    }
}

/// Connectivity switched by hand (forced offline mode, tests)
#[derive(Debug)]
pub struct ManualConnectivity {
    online: AtomicBool,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for ManualConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_manual_connectivity() {
        let connectivity = ManualConnectivity::new(false);
        assert!(!connectivity.is_online());
        connectivity.set_online(true);
        assert!(connectivity.is_online());
    }

    #[test]
    fn test_tcp_probe_reaches_local_listener() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();

        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_millis(500));
        assert!(probe.is_online());
        Ok(())
    }

    #[test]
    fn test_tcp_probe_closed_port() -> anyhow::Result<()> {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();

        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_millis(500));
        assert!(!probe.is_online());
        Ok(())
    }

    #[test]
    fn test_tcp_probe_from_config() {
        let probe = TcpProbe::from_config(&ConnectivityConfig::default());
        assert_eq!(probe.host, "api.jikan.moe");
        assert_eq!(probe.port, 443);
        assert_eq!(probe.timeout, Duration::from_millis(2000));
    }
}
