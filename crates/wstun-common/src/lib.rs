// ============================================
// File: crates/wstun-common/src/lib.rs
// ============================================
//! # wstun Common - Shared Types Library
//!
//! ## Creation Reason
//! Provides the addressing and mode types shared by every wstun crate,
//! so the protocol parser, the OS adapters and the session agree on them.
//!
//! ## Main Functionality
//! - [`types`]: `RemoteNetwork`, `TunnelMode`, `DeviceKind`, `HookOp`
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                wstun-client                         │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │     wstun-core          wstun-transport            │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │              wstun-common  ◄── You are here        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use types::{DeviceKind, HookOp, RemoteNetwork, TunnelMode};
