// ============================================
// File: crates/wstun-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the control channel of the tunnel: how commands are framed as
//! text and how each built-in command's arguments are validated.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`codec`]: Text frame encoding/decoding
//! - [`messages`]: Typed commands and their payloads
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              One WebSocket connection                       │
//! │                                                             │
//! │  Text frames   ──── "init TUN 10.8.0.0/24 1400" ──── control │
//! │  Binary frames ──── raw IP packet / Ethernet frame ─── data  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod messages;

// Re-export primary types
pub use codec::CommandFrame;
pub use messages::{
    AddRouteRequest, Command, CommandKind, InitRequest, ADDROUTE_COMMAND, INIT_COMMAND,
};
