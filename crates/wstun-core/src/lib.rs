// ============================================
// File: crates/wstun-core/src/lib.rs
// ============================================
//! # wstun Core - Control Protocol Library
//!
//! ## Creation Reason
//! Provides the control-channel protocol shared by both ends of the
//! tunnel: text command framing and typed command payloads.
//!
//! ## Main Functionality
//!
//! ### Protocol Module ([`protocol`])
//! - `CommandFrame`: textual `<command> <args...>` frames
//! - `Command`: closed set of decoded commands (`init`, `addroute`, other)
//! - `InitRequest` / `AddRouteRequest`: validated payloads
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                wstun-client                         │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │     wstun-core  ◄──     wstun-transport            │
//! │   You are here            │                        │
//! │         │                 │                        │
//! │         └──────────┬──────┘                        │
//! │                    ▼                               │
//! │              wstun-common                          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate does no I/O; keep it that way so it stays trivially testable
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod protocol;

// Re-export commonly used items
pub use error::{CoreError, Result};
pub use protocol::{AddRouteRequest, Command, CommandFrame, CommandKind, InitRequest};
