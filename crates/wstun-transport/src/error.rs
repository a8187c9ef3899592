// ============================================
// File: crates/wstun-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for the tunnel's OS and network edges: the
//! WebSocket connection, the TUN/TAP device and the route table.
//!
//! ## Main Functionality
//! - `TransportError`: Primary error enum for transport operations
//! - Error conversion from system errors
//! - Categorization of connection vs device vs route errors
//!
//! ## Error Categories
//! 1. **Connection Errors**: Dial, send, receive failures
//! 2. **Device Errors**: Creation, configuration, read/write failures
//! 3. **Route Errors**: Route install/withdraw failures
//! 4. **System Errors**: Permission denied, I/O
//!
//! ## ⚠️ Important Note for Next Developer
//! - Any connection error ends the session; there is no reconnect
//! - Device errors usually mean missing CAP_NET_ADMIN
//! - `ConnectFailed` must never carry the URL's credentials
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use ipnet::Ipv4Net;
use thiserror::Error;

use wstun_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Connection Errors
    // ========================================

    /// Failed to establish the WebSocket connection.
    #[error("Failed to connect to {url}: {reason}")]
    ConnectFailed {
        /// Endpoint URL, credentials stripped
        url: String,
        /// Why the dial failed
        reason: String,
    },

    /// Send operation failed.
    #[error("Failed to send: {reason}")]
    SendFailed {
        /// Why send failed
        reason: String,
    },

    /// Receive operation failed.
    #[error("Failed to receive: {reason}")]
    ReceiveFailed {
        /// Why receive failed
        reason: String,
    },

    /// Connection has already been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================
    // Device Errors
    // ========================================

    /// Failed to create the virtual device.
    #[error("Failed to create device '{name}': {reason}")]
    DeviceCreateFailed {
        /// Requested device name or template
        name: String,
        /// Why creation failed
        reason: String,
    },

    /// Failed to configure the virtual device.
    #[error("Failed to configure device '{name}': {reason}")]
    DeviceConfigFailed {
        /// Device name
        name: String,
        /// Why configuration failed
        reason: String,
    },

    /// Device read failed.
    #[error("Device read failed: {reason}")]
    DeviceReadFailed {
        /// Why read failed
        reason: String,
    },

    /// Device write failed.
    #[error("Device write failed: {reason}")]
    DeviceWriteFailed {
        /// Why write failed
        reason: String,
    },

    /// Device has been closed.
    #[error("Device '{name}' is closed")]
    DeviceClosed {
        /// Device name
        name: String,
    },

    // ========================================
    // Route Errors
    // ========================================

    /// Failed to install or withdraw a route.
    #[error("Route {destination} via {iface} failed: {reason}")]
    RouteFailed {
        /// Destination network
        destination: Ipv4Net,
        /// Interface the route points at
        iface: String,
        /// Why the operation failed
        reason: String,
    },

    // ========================================
    // Configuration Errors
    // ========================================

    /// Invalid configuration.
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig {
        /// Configuration field name
        field: String,
        /// Why it's invalid
        reason: String,
    },

    // ========================================
    // System Errors
    // ========================================

    /// Permission denied for operation.
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// What operation was denied
        operation: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `DeviceCreateFailed` error.
    pub fn device_create_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeviceCreateFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `DeviceConfigFailed` error.
    pub fn device_config_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeviceConfigFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `RouteFailed` error.
    pub fn route_failed(
        destination: Ipv4Net,
        iface: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::RouteFailed {
            destination,
            iface: iface.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if the OS refused for lack of privileges.
    #[must_use]
    pub const fn requires_privileges(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::route_failed(
            "192.168.50.0/24".parse().unwrap(),
            "tun0",
            "File exists",
        );
        assert!(err.to_string().contains("192.168.50.0/24"));
        assert!(err.to_string().contains("tun0"));
    }

    #[test]
    fn test_requires_privileges() {
        let denied = TransportError::PermissionDenied {
            operation: "open /dev/net/tun".into(),
        };
        assert!(denied.requires_privileges());
        let missing = TransportError::device_create_failed("tun%d", "No such device");
        assert!(!missing.requires_privileges());
        let refused = TransportError::connect_failed("ws://127.0.0.1:9000/", "refused");
        assert!(!refused.requires_privileges());
    }
}
