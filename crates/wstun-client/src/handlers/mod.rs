// ============================================
// File: crates/wstun-client/src/handlers/mod.rs
// ============================================
//! # Data Plane Handlers
//!
//! ## Creation Reason
//! Holds the per-packet code that runs once an interface is bound, kept
//! apart from the control-plane services.
//!
//! ### Submodules
//! - [`packet`]: Device ⇄ multiplexer packet pump
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers structure

pub mod packet;

pub use packet::{PacketPump, PumpStats};
