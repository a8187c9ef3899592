// ============================================
// File: crates/wstun-client/src/lib.rs
// ============================================
//! # wstun Client Library
//!
//! ## Creation Reason
//! Provides the tunnel endpoint: one WebSocket connection to a remote peer
//! that drives a local TUN/TAP interface and its routes through text
//! commands, while binary frames carry raw packets.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Client configuration management
//! - [`endpoint`]: URL and credential resolution
//! - [`client`]: Top-level orchestration
//! - [`services`]: Control plane
//!   - [`services::multiplexer`]: Connection multiplexing
//!   - [`services::session`]: Session state machine
//!   - [`services::binding`]: Interface binding
//!   - [`services::hooks`]: Lifecycle scripts
//!   - [`services::registry`]: Extension commands
//! - [`handlers`]: Packet pump between interface and peer
//! - [`error`]: Client-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         wstun Client                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Config    │────►│   Client    │────►│    Session      │    │
//! │  │  Endpoint   │     │ Orchestrator│     │  init/addroute  │    │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘    │
//! │                             │                     │             │
//! │                             ▼                     ▼             │
//! │                      ┌─────────────┐     ┌─────────────────┐    │
//! │                      │ Multiplexer │◄───►│InterfaceBinding │    │
//! │                      └──────┬──────┘     └────────┬────────┘    │
//! │                             │                     │             │
//! ├─────────────────────────────┼─────────────────────┼─────────────┤
//! │                     Transport Layer               │             │
//! │  ┌──────────────────────────┴──┐   ┌──────────────┴──────────┐  │
//! │  │    WebSocket Connection     │   │  TUN/TAP + Route Table  │  │
//! │  └─────────────────────────────┘   └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Peer → text frame   → Multiplexer → Session → Interface / Routes
//! Peer → binary frame → Multiplexer → PacketPump → TUN/TAP
//! Peer ← binary frame ← Multiplexer ← PacketPump ← TUN/TAP
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Client requires root or CAP_NET_ADMIN for TUN/TAP and routes
//! - One connection, one session, at most one interface
//! - The peer gets no error replies; failures are logged locally
//!
//! ## Last Modified
//! v0.1.0 - Initial client library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod services;

// Re-export primary types
pub use client::Client;
pub use config::ClientConfig;
pub use endpoint::{Credentials, Endpoint};
pub use error::{ClientError, CommandError, Result, Severity};
pub use services::{
    CloseReason, CommandContext, CommandHandler, CommandRegistry, Multiplexer, Session,
    SessionState,
};
