// ============================================
// File: crates/wstun-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines abstract interfaces for the tunnel's external collaborators,
//! so the session logic can run against real OS resources or in-memory
//! mocks.
//!
//! ## Main Functionality
//! - `WireMessage`: One transport message, text or binary
//! - `Connection`: Duplex message connection (the WebSocket)
//! - `TunDevice`: Virtual network device read/write interface
//! - `DeviceProvider`: Allocates `TunDevice`s
//! - `RouteTable`: Installs and withdraws routes through an interface
//! - `TunConfig`: Device creation parameters
//!
//! ## Design Philosophy
//! - Traits enable mock implementations for testing
//! - Async-first design with `async_trait`
//! - Methods take `&self` so one `Arc` can be shared by reader, writer
//!   and packet pump tasks
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Connection::send` is NOT required to be safe against concurrent
//!   callers interleaving; the multiplexer guarantees a single writer
//! - `TunDevice::close` and `Connection::close` must be idempotent
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ipnet::Ipv4Net;

use wstun_common::{DeviceKind, RemoteNetwork};

use crate::error::{Result, TransportError};

// ============================================
// WireMessage
// ============================================

/// A single message on the connection.
///
/// The message kind is the structural tag separating the two logical
/// channels: text carries commands, binary carries packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Control-channel command frame.
    Text(String),
    /// Data-channel packet, one network-layer frame.
    Binary(Bytes),
}

impl WireMessage {
    /// Returns `true` for control-channel messages.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns `true` if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================
// Connection Trait
// ============================================

/// Duplex message connection to the remote peer.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`. One task calls `recv` while
/// another calls `send`; implementations must allow that.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Sends one message.
    ///
    /// # Errors
    /// Returns error if the connection is closed or the write fails.
    async fn send(&self, msg: WireMessage) -> Result<()>;

    /// Receives the next text or binary message.
    ///
    /// # Returns
    /// `Ok(None)` once the peer closed the connection or it was closed
    /// locally.
    ///
    /// # Errors
    /// Returns error if the read fails.
    async fn recv(&self) -> Result<Option<WireMessage>>;

    /// Sends a keepalive ping.
    ///
    /// # Errors
    /// Returns error if the write fails.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Closes the connection. Calling it again has no effect.
    ///
    /// # Errors
    /// Returns error if the close handshake could not be sent.
    async fn close(&self) -> Result<()>;

    /// Returns `true` until `close` is called or the peer goes away.
    fn is_open(&self) -> bool;
}

// ============================================
// TunDevice Trait
// ============================================

/// Abstract interface for virtual network device operations.
///
/// # Data Format
/// TUN devices carry raw IP packets, TAP devices raw Ethernet frames.
/// No packet information header is ever present.
#[async_trait]
pub trait TunDevice: Send + Sync {
    /// Reads one frame from the device.
    ///
    /// # Errors
    /// Returns error if the read fails or the device is closed.
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Writes one frame to the device.
    ///
    /// # Errors
    /// Returns error if the write fails or the device is closed.
    async fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Returns the kernel-assigned device name.
    fn name(&self) -> &str;

    /// Returns the device kind.
    fn kind(&self) -> DeviceKind;

    /// Returns the MTU.
    fn mtu(&self) -> u16;

    /// Applies the MTU, optionally assigns an address, and brings the
    /// link up.
    ///
    /// # Errors
    /// Returns `DeviceConfigFailed` if any step fails.
    async fn configure(&self, address: Option<Ipv4Net>) -> Result<()>;

    /// Releases the device. Calling it again has no effect.
    ///
    /// # Errors
    /// Returns error if the link could not be brought down.
    async fn close(&self) -> Result<()>;

    /// Returns `true` until `close` is called.
    fn is_open(&self) -> bool;
}

// ============================================
// DeviceProvider Trait
// ============================================

/// Allocates virtual network devices.
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    /// Creates a device.
    ///
    /// # Errors
    /// Returns `DeviceCreateFailed` if the OS cannot allocate it.
    async fn create(&self, config: TunConfig) -> Result<Arc<dyn TunDevice>>;
}

// ============================================
// RouteTable Trait
// ============================================

/// Installs routes through the tunnel interface.
///
/// No deduplication is done; installing the same route twice reaches the
/// OS and fails there.
#[async_trait]
pub trait RouteTable: Send + Sync {
    /// Routes `destination` via the network's peer address on `iface`.
    ///
    /// # Errors
    /// Returns `RouteFailed` if the OS rejects the route.
    async fn add_route(
        &self,
        iface: &str,
        destination: Ipv4Net,
        network: &RemoteNetwork,
    ) -> Result<()>;

    /// Withdraws a route previously installed with `add_route`.
    ///
    /// # Errors
    /// Returns `RouteFailed` if the OS rejects the removal.
    async fn remove_route(
        &self,
        iface: &str,
        destination: Ipv4Net,
        network: &RemoteNetwork,
    ) -> Result<()>;
}

// ============================================
// TunConfig
// ============================================

/// Parameters for device creation.
///
/// # Example
/// ```
/// use wstun_common::DeviceKind;
/// use wstun_transport::traits::TunConfig;
///
/// let config = TunConfig::new(DeviceKind::Tap).with_mtu(1400);
/// assert_eq!(config.name, "tap%d");
/// ```
#[derive(Debug, Clone)]
pub struct TunConfig {
    /// Device kind.
    pub kind: DeviceKind,
    /// Device name or kernel template (e.g. "tun%d").
    pub name: String,
    /// MTU size.
    pub mtu: u16,
}

impl TunConfig {
    /// Minimum MTU accepted (IPv4 minimum datagram size).
    pub const MIN_MTU: u16 = 68;

    /// Creates a configuration with the kind's default name template.
    #[must_use]
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            name: kind.name_template().to_string(),
            mtu: 1500,
        }
    }

    /// Sets the device name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the MTU.
    #[must_use]
    pub const fn with_mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(TransportError::invalid_config(
                "name",
                "device name cannot be empty",
            ));
        }

        if self.name.len() > 15 {
            return Err(TransportError::invalid_config(
                "name",
                "device name cannot exceed 15 characters",
            ));
        }

        if self.mtu < Self::MIN_MTU {
            return Err(TransportError::invalid_config(
                "mtu",
                format!("MTU must be at least {} bytes", Self::MIN_MTU),
            ));
        }

        Ok(())
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_message() {
        let text = WireMessage::Text("init TUN 10.8.0.0/24 1400".into());
        assert!(text.is_text());
        assert_eq!(text.len(), 25);

        let bin = WireMessage::Binary(Bytes::new());
        assert!(!bin.is_text());
        assert!(bin.is_empty());
    }

    #[test]
    fn test_tun_config_defaults() {
        let config = TunConfig::new(DeviceKind::Tun);
        assert_eq!(config.name, "tun%d");
        assert_eq!(config.mtu, 1500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tun_config_validation() {
        assert!(TunConfig::new(DeviceKind::Tun).with_name("").validate().is_err());
        assert!(TunConfig::new(DeviceKind::Tun)
            .with_name("a".repeat(20))
            .validate()
            .is_err());
        assert!(TunConfig::new(DeviceKind::Tun).with_mtu(40).validate().is_err());
        assert!(TunConfig::new(DeviceKind::Tap).with_mtu(9000).validate().is_ok());
    }
}
