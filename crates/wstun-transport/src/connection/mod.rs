// ============================================
// File: crates/wstun-transport/src/connection/mod.rs
// ============================================
//! # Connection Module
//!
//! ## Creation Reason
//! Provides the duplex message connection to the remote peer.
//!
//! ## Implementations
//! - `websocket`: `tokio-tungstenite` client connection
//! - `mock`: In-memory connection for testing
//!
//! ## Last Modified
//! v0.1.0 - Initial module structure

pub mod websocket;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use websocket::WebSocketConnection;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockConnection;
