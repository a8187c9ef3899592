// ============================================
// File: crates/wstun-client/src/services/binding.rs
// ============================================
//! # Interface Binding
//!
//! ## Creation Reason
//! Owns the one virtual interface of a session, from creation through
//! configuration and binding to its close.
//!
//! ## Main Functionality
//! - `create`: allocate a TUN/TAP device of the requested kind and MTU
//! - `configure`: MTU + link up, optionally the address and a default
//!   route through the tunnel
//! - `bind`: attach the device to the multiplexer and start the pumps
//! - `close`: detach, stop the pumps and release the device (idempotent)
//!
//! ## Lifecycle
//! ```text
//!   (empty) ──create──► created ──configure──► configured ──bind──► bound
//!      ▲                   │                        │                 │
//!      └───────────────────┴──────── close ─────────┴─────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only this type holds the device; everything else borrows the handle
//! - The default route is returned to the caller so the session can
//!   withdraw it with the other routes it installed
//!
//! ## Last Modified
//! v0.1.0 - Initial interface binding

use std::sync::Arc;

use ipnet::Ipv4Net;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use wstun_common::{DeviceKind, RemoteNetwork};
use wstun_transport::error::{Result, TransportError};
use wstun_transport::traits::{DeviceProvider, RouteTable, TunConfig, TunDevice};

use crate::handlers::packet::{PacketPump, PumpStats};
use crate::services::multiplexer::Multiplexer;

/// Inbound packet queue depth used when none is configured.
pub const DEFAULT_PACKET_QUEUE: usize = 512;

/// Destination of the default route, `0.0.0.0/0`.
#[must_use]
pub fn default_route() -> Ipv4Net {
    Ipv4Net::default()
}

// ============================================
// InterfaceHandle
// ============================================

/// The bound OS network device.
pub struct InterfaceHandle {
    device: Arc<dyn TunDevice>,
    mux: Option<Arc<Multiplexer>>,
    pump: Option<PacketPump>,
}

impl InterfaceHandle {
    /// Kernel-assigned interface name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.device.name()
    }

    /// Interface MTU.
    #[must_use]
    pub fn mtu(&self) -> u16 {
        self.device.mtu()
    }

    /// Device kind.
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.device.kind()
    }

    /// Returns `true` until the handle is closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.device.is_open()
    }

    /// Returns `true` once the packet pump is running.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.pump.is_some()
    }

    /// Pump counters, once bound.
    #[must_use]
    pub fn pump_stats(&self) -> Option<PumpStats> {
        self.pump.as_ref().map(PacketPump::stats)
    }
}

impl std::fmt::Debug for InterfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceHandle")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("mtu", &self.mtu())
            .field("open", &self.is_open())
            .field("bound", &self.is_bound())
            .finish()
    }
}

// ============================================
// InterfaceBinding
// ============================================

/// Lifecycle owner of one interface.
pub struct InterfaceBinding {
    provider: Arc<dyn DeviceProvider>,
    routes: Arc<dyn RouteTable>,
    packet_queue: usize,
    handle: Option<InterfaceHandle>,
}

impl InterfaceBinding {
    /// Creates an empty binding.
    #[must_use]
    pub fn new(provider: Arc<dyn DeviceProvider>, routes: Arc<dyn RouteTable>) -> Self {
        Self {
            provider,
            routes,
            packet_queue: DEFAULT_PACKET_QUEUE,
            handle: None,
        }
    }

    /// Sets the inbound packet queue depth used by `bind`.
    #[must_use]
    pub fn with_packet_queue(mut self, depth: usize) -> Self {
        self.packet_queue = depth.max(1);
        self
    }

    /// The current handle, if any.
    #[must_use]
    pub fn handle(&self) -> Option<&InterfaceHandle> {
        self.handle.as_ref()
    }

    /// Allocates the device.
    ///
    /// # Errors
    /// - `InvalidConfig` if a device already exists or the MTU is too small
    /// - `DeviceCreateFailed` if the OS refuses
    pub async fn create(&mut self, kind: DeviceKind, mtu: u16) -> Result<&InterfaceHandle> {
        if self.handle.is_some() {
            return Err(TransportError::invalid_config(
                "interface",
                "an interface already exists",
            ));
        }

        let config = TunConfig::new(kind).with_mtu(mtu);
        config.validate()?;
        let device = self.provider.create(config).await?;
        info!(iface = %device.name(), kind = %kind, mtu, "Interface created");

        Ok(self.handle.insert(InterfaceHandle {
            device,
            mux: None,
            pump: None,
        }))
    }

    /// Configures the device.
    ///
    /// # Arguments
    /// * `with_addressing` - Assign the network's local address
    /// * `network` - The session's network
    /// * `default_gateway` - Also route `0.0.0.0/0` through the tunnel
    ///
    /// # Returns
    /// The default route if one was installed.
    ///
    /// # Errors
    /// - `DeviceConfigFailed` if MTU, address or link state cannot be set
    /// - `RouteFailed` if the default route is rejected
    pub async fn configure(
        &self,
        with_addressing: bool,
        network: &RemoteNetwork,
        default_gateway: bool,
    ) -> Result<Option<Ipv4Net>> {
        let handle = self.require_handle()?;
        let address = with_addressing.then(|| network.net());
        handle.device.configure(address).await?;
        debug!(iface = %handle.name(), ?address, "Interface configured");

        if !(with_addressing && default_gateway) {
            return Ok(None);
        }
        self.routes
            .add_route(handle.name(), default_route(), network)
            .await?;
        info!(iface = %handle.name(), via = %network.peer_addr(), "Default gateway installed");
        Ok(Some(default_route()))
    }

    /// Attaches the device to the multiplexer and starts both packet
    /// flows.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if there is no device, it is already bound,
    /// or the multiplexer already has an interface.
    pub fn bind(&mut self, mux: &Arc<Multiplexer>) -> Result<()> {
        let queue = self.packet_queue;
        let handle = self.handle.as_mut().ok_or_else(missing_interface)?;
        if handle.pump.is_some() {
            return Err(TransportError::invalid_config(
                "interface",
                "interface is already bound",
            ));
        }

        let (tx, rx) = mpsc::channel(queue);
        mux.bind_interface(tx)?;
        handle.pump = Some(PacketPump::spawn(
            Arc::clone(&handle.device),
            Arc::clone(mux),
            rx,
        ));
        handle.mux = Some(Arc::clone(mux));
        debug!(iface = %handle.name(), "Packet pump started");
        Ok(())
    }

    /// Stops both flows and releases the device. Does nothing once the
    /// handle is gone.
    pub async fn close(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };

        if let Some(mux) = handle.mux.take() {
            mux.unbind_interface();
        }
        if let Err(e) = handle.device.close().await {
            warn!(iface = %handle.name(), "Interface close: {}", e);
        }
        let stats = handle.pump_stats().unwrap_or_default();
        if let Some(pump) = handle.pump.take() {
            pump.stop().await;
        }
        info!(
            iface = %handle.name(),
            to_peer = stats.to_peer,
            to_device = stats.to_device,
            "Interface closed"
        );
    }

    fn require_handle(&self) -> Result<&InterfaceHandle> {
        self.handle.as_ref().ok_or_else(missing_interface)
    }
}

fn missing_interface() -> TransportError {
    TransportError::invalid_config("interface", "no interface has been created")
}

impl std::fmt::Debug for InterfaceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceBinding")
            .field("handle", &self.handle)
            .field("packet_queue", &self.packet_queue)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use wstun_transport::{MockDeviceProvider, MockRouteTable, RouteOp};

    fn binding() -> (InterfaceBinding, Arc<MockDeviceProvider>, Arc<MockRouteTable>) {
        let provider = Arc::new(MockDeviceProvider::new());
        let routes = Arc::new(MockRouteTable::new());
        (
            InterfaceBinding::new(provider.clone(), routes.clone()),
            provider,
            routes,
        )
    }

    fn network() -> RemoteNetwork {
        "10.8.0.2/24".parse().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_configure() {
        let (mut binding, provider, routes) = binding();

        let handle = binding.create(DeviceKind::Tun, 1400).await.unwrap();
        assert_eq!(handle.name(), "tun0");
        assert_eq!(handle.mtu(), 1400);

        assert_eq!(binding.configure(true, &network(), false).await.unwrap(), None);
        let device = provider.last_device().unwrap();
        assert_eq!(device.configure_calls(), vec![Some("10.8.0.2/24".parse().unwrap())]);
        assert!(routes.calls().is_empty());

        assert!(binding.create(DeviceKind::Tun, 1400).await.is_err());
    }

    #[tokio::test]
    async fn test_configure_without_addressing() {
        let (mut binding, provider, routes) = binding();
        binding.create(DeviceKind::Tap, 1500).await.unwrap();

        assert_eq!(binding.configure(false, &network(), true).await.unwrap(), None);
        assert_eq!(provider.last_device().unwrap().configure_calls(), vec![None]);
        assert!(routes.calls().is_empty());
    }

    #[tokio::test]
    async fn test_default_gateway() {
        let (mut binding, _provider, routes) = binding();
        binding.create(DeviceKind::Tun, 1400).await.unwrap();

        let installed = binding.configure(true, &network(), true).await.unwrap();
        assert_eq!(installed, Some("0.0.0.0/0".parse().unwrap()));

        let adds = routes.calls_of(RouteOp::Add);
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].destination, default_route());
        assert_eq!(adds[0].iface, "tun0");
    }

    #[tokio::test]
    async fn test_create_failure_leaves_no_handle() {
        let (mut binding, provider, _routes) = binding();
        provider.fail_create(true);

        assert!(binding.create(DeviceKind::Tun, 1400).await.is_err());
        assert!(binding.handle().is_none());
        assert!(binding.configure(true, &network(), false).await.is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut binding, provider, _routes) = binding();
        binding.create(DeviceKind::Tun, 1400).await.unwrap();

        binding.close().await;
        binding.close().await;

        let device = provider.last_device().unwrap();
        assert!(!device.is_open());
        assert_eq!(device.close_count(), 1);
        assert!(binding.handle().is_none());
    }

    #[tokio::test]
    async fn test_bound_close_stops_pump_promptly() {
        use crate::services::multiplexer::MultiplexerConfig;
        use std::time::Duration;
        use wstun_transport::MockConnection;

        let (mut binding, provider, _routes) = binding();
        let conn = Arc::new(MockConnection::new());
        let (mux, _commands) = Multiplexer::start(conn.clone(), MultiplexerConfig::default());

        binding.create(DeviceKind::Tun, 1400).await.unwrap();
        binding.bind(&mux).unwrap();
        assert_eq!(binding.handle().unwrap().pump_stats(), Some(PumpStats::default()));

        let device = provider.last_device().unwrap();
        device.inject_packet(vec![0x45, 0x00, 0x00, 0x14]);
        conn.wait_for_sent(1).await;
        while binding.handle().unwrap().pump_stats().unwrap().to_peer == 0 {
            tokio::task::yield_now().await;
        }

        tokio::time::timeout(Duration::from_millis(500), binding.close())
            .await
            .expect("close should not wait for the pump stop timeout");
        assert!(!device.is_open());
        assert!(binding.handle().is_none());

        mux.stop().await;
    }
}
