// ============================================
// File: crates/wstun-client/src/services/mod.rs
// ============================================
//! # Client Services
//!
//! ## Creation Reason
//! Holds the control plane of the tunnel endpoint, separated from the
//! transport edges and from the per-packet data plane.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`multiplexer`]: One connection, command and packet channels
//! - [`session`]: Session state machine and built-in commands
//! - [`binding`]: Interface lifecycle and packet pump startup
//! - [`hooks`]: Up/down lifecycle scripts
//! - [`registry`]: Extension command handlers
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐ commands ┌───────────────────────────┐ │
//! │  │   Multiplexer   │─────────►│         Session           │ │
//! │  │  - reader task  │          │  - init / addroute        │ │
//! │  │  - writer task  │          │  - CommandRegistry        │ │
//! │  └────────▲────────┘          │  - LifecycleHooks         │ │
//! │           │ packets           └─────────────┬─────────────┘ │
//! │  ┌────────┴────────┐                        │               │
//! │  │ InterfaceBinding│◄───────────────────────┘               │
//! │  │  - PacketPump   │──► RouteTable (default gateway)        │
//! │  └─────────────────┘                                        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod binding;
pub mod hooks;
pub mod multiplexer;
pub mod registry;
pub mod session;

// Re-export primary types
pub use binding::{InterfaceBinding, InterfaceHandle};
pub use hooks::{HookRunner, LifecycleHooks, ScriptRunner};
pub use multiplexer::{CloseReason, Multiplexer, MultiplexerConfig, MultiplexerStats};
pub use registry::{CommandContext, CommandHandler, CommandRegistry};
pub use session::{Session, SessionOptions, SessionState};
