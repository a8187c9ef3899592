// ============================================
// File: crates/wstun-transport/src/lib.rs
// ============================================
//! # wstun Transport - OS and Network Edges
//!
//! ## Creation Reason
//! Puts every external collaborator of the tunnel behind a trait: the
//! WebSocket connection to the peer, the TUN/TAP device and the OS
//! routing table.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `Connection`, `TunDevice`, `DeviceProvider`, `RouteTable`
//! - [`connection`]: WebSocket client connection
//! - [`tun`]: TUN/TAP device management (Linux)
//! - [`route`]: Route table adapters
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                wstun-client                         │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │     wstun-core          wstun-transport            │
//! │                         You are here ◄──           │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │              wstun-common                          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//!   remote peer ◄══ WebSocket (text: commands, binary: packets) ══► Connection
//!                                                                      │
//!                                                              wstun-client
//!                                                                      │
//!   local stack ◄════════════ TUN/TAP device (frames) ═══════════► TunDevice
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Device and route operations require elevated privileges
//! - Mock implementations available with the `mock` feature
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod connection;
pub mod error;
#[cfg(target_os = "linux")]
mod ip;
pub mod route;
pub mod traits;
pub mod tun;

// Re-export primary types
pub use connection::WebSocketConnection;
pub use error::{Result, TransportError};
pub use traits::{Connection, DeviceProvider, RouteTable, TunConfig, TunDevice, WireMessage};

#[cfg(target_os = "linux")]
pub use route::LinuxRouteTable;
#[cfg(target_os = "linux")]
pub use tun::{LinuxDeviceProvider, LinuxTun};

#[cfg(any(test, feature = "mock"))]
pub use connection::MockConnection;
#[cfg(any(test, feature = "mock"))]
pub use route::{MockRouteTable, RouteCall, RouteOp};
#[cfg(any(test, feature = "mock"))]
pub use tun::{MockDeviceProvider, MockTun};
