// ============================================
// File: crates/wstun-transport/src/tun/mod.rs
// ============================================
//! # TUN/TAP Device Module
//!
//! ## Creation Reason
//! Provides virtual network device management for the tunnel endpoint.
//!
//! ## Platform Implementations
//! - `linux`: Uses `/dev/net/tun` with `IFF_TUN` or `IFF_TAP`
//! - `mock`: In-memory implementation for testing
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     User Space                            │
//! │  ┌────────────────┐          ┌────────────────────────┐  │
//! │  │  Application   │          │     wstun-client       │  │
//! │  └───────┬────────┘          └───────────┬────────────┘  │
//! │          │ sockets                       │ read/write    │
//! ├──────────┼───────────────────────────────┼───────────────┤
//! │          ▼         Kernel Space          ▼               │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │            TUN/TAP device (tun0 / tap0)            │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Device operations require root or `CAP_NET_ADMIN`
//! - Device names are limited to 15 characters on Linux
//!
//! ## Last Modified
//! v0.1.0 - Initial module structure

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(target_os = "linux")]
pub use linux::{LinuxDeviceProvider, LinuxTun};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockDeviceProvider, MockTun};
