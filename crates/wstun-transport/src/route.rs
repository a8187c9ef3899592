// ============================================
// File: crates/wstun-transport/src/route.rs
// ============================================
//! # Route Table Adapters
//!
//! ## Creation Reason
//! Installs and withdraws OS routes that point through the tunnel
//! interface, with the remote network's peer address as the gateway.
//!
//! ## Main Functionality
//! - `LinuxRouteTable`: `ip route add|del <dst> via <peer> dev <iface>`
//! - `MockRouteTable`: Records calls and emulates duplicate rejection
//!
//! ## ⚠️ Important Note for Next Developer
//! - Adapters never deduplicate; the OS reports duplicates as errors
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockRouteTable, RouteCall, RouteOp};

#[cfg(target_os = "linux")]
pub use linux::LinuxRouteTable;

// ============================================
// LinuxRouteTable
// ============================================

#[cfg(target_os = "linux")]
mod linux {
    use async_trait::async_trait;
    use ipnet::Ipv4Net;
    use tracing::info;

    use wstun_common::RemoteNetwork;

    use crate::error::{Result, TransportError};
    use crate::ip;
    use crate::traits::RouteTable;

    /// Route table backed by iproute2.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct LinuxRouteTable;

    impl LinuxRouteTable {
        async fn route(
            verb: &str,
            iface: &str,
            destination: Ipv4Net,
            network: &RemoteNetwork,
        ) -> Result<()> {
            let dst = destination.to_string();
            let via = network.peer_addr().to_string();
            ip::run(&["route", verb, &dst, "via", &via, "dev", iface])
                .await
                .map_err(|reason| TransportError::route_failed(destination, iface, reason))
        }
    }

    #[async_trait]
    impl RouteTable for LinuxRouteTable {
        async fn add_route(
            &self,
            iface: &str,
            destination: Ipv4Net,
            network: &RemoteNetwork,
        ) -> Result<()> {
            Self::route("add", iface, destination, network).await?;
            info!(iface = %iface, route = %destination, via = %network.peer_addr(), "Route added");
            Ok(())
        }

        async fn remove_route(
            &self,
            iface: &str,
            destination: Ipv4Net,
            network: &RemoteNetwork,
        ) -> Result<()> {
            Self::route("del", iface, destination, network).await?;
            info!(iface = %iface, route = %destination, "Route removed");
            Ok(())
        }
    }
}

// ============================================
// MockRouteTable
// ============================================

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::HashSet;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use ipnet::Ipv4Net;
    use parking_lot::Mutex;

    use wstun_common::RemoteNetwork;

    use crate::error::{Result, TransportError};
    use crate::traits::RouteTable;

    /// Kind of recorded route call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RouteOp {
        /// `add_route`
        Add,
        /// `remove_route`
        Remove,
    }

    /// One recorded route call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RouteCall {
        /// Operation
        pub op: RouteOp,
        /// Interface name
        pub iface: String,
        /// Destination network
        pub destination: Ipv4Net,
        /// Gateway derived from the remote network
        pub via: Ipv4Addr,
    }

    /// In-memory route table for tests.
    #[derive(Debug, Default)]
    pub struct MockRouteTable {
        calls: Mutex<Vec<RouteCall>>,
        installed: Mutex<HashSet<(String, Ipv4Net)>>,
        fail_add: AtomicBool,
    }

    impl MockRouteTable {
        /// Creates an empty table.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every subsequent `add_route` fail.
        pub fn fail_add(&self, fail: bool) {
            self.fail_add.store(fail, Ordering::Release);
        }

        /// Every call made so far, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<RouteCall> {
            self.calls.lock().clone()
        }

        /// Calls of one kind.
        #[must_use]
        pub fn calls_of(&self, op: RouteOp) -> Vec<RouteCall> {
            self.calls.lock().iter().filter(|c| c.op == op).cloned().collect()
        }

        /// Routes currently installed.
        #[must_use]
        pub fn installed(&self) -> Vec<Ipv4Net> {
            let mut routes: Vec<_> = self.installed.lock().iter().map(|(_, n)| *n).collect();
            routes.sort();
            routes
        }

        fn record(&self, op: RouteOp, iface: &str, destination: Ipv4Net, network: &RemoteNetwork) {
            self.calls.lock().push(RouteCall {
                op,
                iface: iface.to_string(),
                destination,
                via: network.peer_addr(),
            });
        }
    }

    #[async_trait]
    impl RouteTable for MockRouteTable {
        async fn add_route(
            &self,
            iface: &str,
            destination: Ipv4Net,
            network: &RemoteNetwork,
        ) -> Result<()> {
            self.record(RouteOp::Add, iface, destination, network);
            if self.fail_add.load(Ordering::Acquire) {
                return Err(TransportError::route_failed(destination, iface, "simulated failure"));
            }
            if !self.installed.lock().insert((iface.to_string(), destination)) {
                return Err(TransportError::route_failed(destination, iface, "File exists"));
            }
            Ok(())
        }

        async fn remove_route(
            &self,
            iface: &str,
            destination: Ipv4Net,
            network: &RemoteNetwork,
        ) -> Result<()> {
            self.record(RouteOp::Remove, iface, destination, network);
            if !self.installed.lock().remove(&(iface.to_string(), destination)) {
                return Err(TransportError::route_failed(destination, iface, "No such process"));
            }
            Ok(())
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RouteTable;
    use wstun_common::RemoteNetwork;

    #[tokio::test]
    async fn test_mock_route_table_records_calls() {
        let table = MockRouteTable::new();
        let net = RemoteNetwork::parse("10.8.0.2/24").unwrap();
        let dst = "192.168.50.0/24".parse().unwrap();

        table.add_route("tun0", dst, &net).await.unwrap();

        let calls = table.calls_of(RouteOp::Add);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].destination, dst);
        assert_eq!(calls[0].via.to_string(), "10.8.0.1");
        assert_eq!(table.installed(), vec![dst]);
    }

    #[tokio::test]
    async fn test_mock_route_table_rejects_duplicates() {
        let table = MockRouteTable::new();
        let net = RemoteNetwork::parse("10.8.0.2/24").unwrap();
        let dst = "192.168.50.0/24".parse().unwrap();

        table.add_route("tun0", dst, &net).await.unwrap();
        let err = table.add_route("tun0", dst, &net).await.unwrap_err();
        assert!(matches!(err, crate::TransportError::RouteFailed { .. }));

        table.remove_route("tun0", dst, &net).await.unwrap();
        assert!(table.installed().is_empty());
        assert!(table.remove_route("tun0", dst, &net).await.is_err());
    }
}
