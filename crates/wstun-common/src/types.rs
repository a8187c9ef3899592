// ============================================
// File: crates/wstun-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the addressing and mode types that every layer of the
//! tunnel passes around, so the control protocol, the OS adapters and the
//! session logic agree on one representation.
//!
//! ## Main Functionality
//! - `RemoteNetwork`: The negotiated addressing record established by `init`
//! - `TunnelMode`: `TUN`, `TAP` or `TAP_NOCONF` as sent by the peer
//! - `DeviceKind`: The kind of kernel device to allocate
//! - `HookOp`: Lifecycle hook operation (`up` / `down`)
//!
//! ## Main Logical Flow
//! 1. The `init` command text is parsed into `TunnelMode` + `RemoteNetwork`
//! 2. `TunnelMode` selects a `DeviceKind` and whether addressing is applied
//! 3. `RemoteNetwork` is lent to route and hook calls for the session lifetime
//!
//! ## ⚠️ Important Note for Next Developer
//! - `RemoteNetwork::as_str()` must return the text exactly as received;
//!   hook scripts and logs rely on it
//! - The peer/gateway address is network + 1, not the host part of the input
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;

use crate::error::CommonError;

// ============================================
// RemoteNetwork
// ============================================

/// The session's negotiated addressing record.
///
/// Built once from the `init` command's subnet argument and immutable
/// thereafter.
///
/// # Example
/// ```
/// use wstun_common::RemoteNetwork;
///
/// let net: RemoteNetwork = "10.8.0.2/24".parse().unwrap();
/// assert_eq!(net.as_str(), "10.8.0.2/24");
/// assert_eq!(net.local_addr().to_string(), "10.8.0.2");
/// assert_eq!(net.peer_addr().to_string(), "10.8.0.1");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RemoteNetwork {
    net: Ipv4Net,
    canonical: String,
}

impl RemoteNetwork {
    /// Parses a subnet string of the form `a.b.c.d/len`.
    ///
    /// # Errors
    /// Returns `CommonError::InvalidNetwork` if the text is not IPv4 CIDR.
    pub fn parse(spec: &str) -> Result<Self, CommonError> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(CommonError::invalid_network(spec, "empty network"));
        }
        let net = Ipv4Net::from_str(trimmed)
            .map_err(|e| CommonError::invalid_network(spec, e.to_string()))?;
        Ok(Self {
            net,
            canonical: trimmed.to_string(),
        })
    }

    /// Returns the canonical string form, as received.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Returns the underlying CIDR value.
    #[must_use]
    pub const fn net(&self) -> Ipv4Net {
        self.net
    }

    /// Address assigned to the local interface.
    #[must_use]
    pub fn local_addr(&self) -> Ipv4Addr {
        self.net.addr()
    }

    /// Prefix length of the tunnel network.
    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    /// Peer address, used as the gateway for routes through the tunnel.
    ///
    /// This is the first host of the network. For a /32 there is no room
    /// for a separate host, so the network address itself is returned.
    #[must_use]
    pub fn peer_addr(&self) -> Ipv4Addr {
        let network = u32::from(self.net.network());
        if self.net.prefix_len() >= 32 {
            return Ipv4Addr::from(network);
        }
        Ipv4Addr::from(network.wrapping_add(1))
    }

    /// Broadcast address of the tunnel network.
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        self.net.broadcast()
    }
}

impl FromStr for RemoteNetwork {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RemoteNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl fmt::Debug for RemoteNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteNetwork({})", self.canonical)
    }
}

// ============================================
// DeviceKind
// ============================================

/// Kind of virtual network device to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Layer 3 device carrying IP packets.
    Tun,
    /// Layer 2 device carrying Ethernet frames.
    Tap,
}

impl DeviceKind {
    /// Kernel name template for this kind.
    #[must_use]
    pub const fn name_template(self) -> &'static str {
        match self {
            Self::Tun => "tun%d",
            Self::Tap => "tap%d",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tun => f.write_str("tun"),
            Self::Tap => f.write_str("tap"),
        }
    }
}

// ============================================
// TunnelMode
// ============================================

/// Tunnel mode requested by the peer in `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunnelMode {
    /// TUN device with addressing.
    Tun,
    /// TAP device with addressing.
    Tap,
    /// TAP device; the address is left to someone else.
    TapNoConf,
}

impl TunnelMode {
    /// Device kind backing this mode.
    #[must_use]
    pub const fn device_kind(self) -> DeviceKind {
        match self {
            Self::Tun => DeviceKind::Tun,
            Self::Tap | Self::TapNoConf => DeviceKind::Tap,
        }
    }

    /// Whether the local address should be assigned to the interface.
    #[must_use]
    pub const fn with_addressing(self) -> bool {
        !matches!(self, Self::TapNoConf)
    }

    /// Wire token for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tun => "TUN",
            Self::Tap => "TAP",
            Self::TapNoConf => "TAP_NOCONF",
        }
    }
}

impl FromStr for TunnelMode {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TUN" => Ok(Self::Tun),
            "TAP" => Ok(Self::Tap),
            "TAP_NOCONF" => Ok(Self::TapNoConf),
            other => Err(CommonError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for TunnelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// HookOp
// ============================================

/// Lifecycle hook operation passed as the script's first argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookOp {
    /// The tunnel became active.
    Up,
    /// The tunnel is going offline.
    Down,
}

impl HookOp {
    /// Argument string handed to the script.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for HookOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_network_parse() {
        let net = RemoteNetwork::parse("10.8.0.0/24").unwrap();
        assert_eq!(net.as_str(), "10.8.0.0/24");
        assert_eq!(net.to_string(), "10.8.0.0/24");
        assert_eq!(net.prefix_len(), 24);
        assert_eq!(net.local_addr(), Ipv4Addr::new(10, 8, 0, 0));
        assert_eq!(net.peer_addr(), Ipv4Addr::new(10, 8, 0, 1));
        assert_eq!(net.broadcast(), Ipv4Addr::new(10, 8, 0, 255));
    }

    #[test]
    fn test_remote_network_host_address() {
        let net = RemoteNetwork::parse("10.8.0.7/24").unwrap();
        assert_eq!(net.local_addr(), Ipv4Addr::new(10, 8, 0, 7));
        assert_eq!(net.peer_addr(), Ipv4Addr::new(10, 8, 0, 1));
    }

    #[test]
    fn test_remote_network_single_host() {
        let net = RemoteNetwork::parse("192.168.1.9/32").unwrap();
        assert_eq!(net.peer_addr(), Ipv4Addr::new(192, 168, 1, 9));
    }

    #[test]
    fn test_remote_network_rejects_garbage() {
        assert!(RemoteNetwork::parse("").is_err());
        assert!(RemoteNetwork::parse("10.8.0.0").is_err());
        assert!(RemoteNetwork::parse("10.8.0.0/33").is_err());
        assert!(RemoteNetwork::parse("not-a-net").is_err());
    }

    #[test]
    fn test_tunnel_mode() {
        assert_eq!("TUN".parse::<TunnelMode>().unwrap(), TunnelMode::Tun);
        assert_eq!("TAP_NOCONF".parse::<TunnelMode>().unwrap(), TunnelMode::TapNoConf);
        assert!("tun".parse::<TunnelMode>().is_err());

        assert_eq!(TunnelMode::TapNoConf.device_kind(), DeviceKind::Tap);
        assert!(TunnelMode::Tap.with_addressing());
        assert!(!TunnelMode::TapNoConf.with_addressing());
    }

    #[test]
    fn test_hook_op_strings() {
        assert_eq!(HookOp::Up.as_str(), "up");
        assert_eq!(HookOp::Down.to_string(), "down");
        assert_eq!(DeviceKind::Tap.name_template(), "tap%d");
    }
}
