// ============================================
// File: crates/wstun-client/src/services/registry.rs
// ============================================
//! # Command Registry
//!
//! ## Creation Reason
//! Lets embedders add named control-channel commands next to the two
//! built-ins without touching the session's dispatch.
//!
//! ## Main Functionality
//! - `CommandHandler`: one extension command
//! - `CommandContext`: read-only view of the session plus a reply path
//! - `CommandRegistry`: name → handler map, filled before serving
//!
//! ## ⚠️ Important Note for Next Developer
//! - `init` and `addroute` are dispatched by the session itself and can
//!   never be registered
//! - The session holds the registry behind an `Arc` with no mutation API,
//!   so nothing can register while frames are being dispatched
//!
//! ## Last Modified
//! v0.1.0 - Initial command registry

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use wstun_common::RemoteNetwork;
use wstun_core::protocol::{CommandFrame, CommandKind};
use wstun_transport::error::Result as TransportResult;

use crate::error::{ClientError, CommandError, Result};
use crate::services::multiplexer::Multiplexer;
use crate::services::session::SessionState;

// ============================================
// CommandContext
// ============================================

/// What an extension handler may see and do.
pub struct CommandContext<'a> {
    /// Session state when the command was dispatched.
    pub state: SessionState,
    /// Negotiated network, once `init` has completed.
    pub network: Option<&'a RemoteNetwork>,
    /// Interface name, once `init` has completed.
    pub iface: Option<&'a str>,
    mux: &'a Multiplexer,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(
        state: SessionState,
        network: Option<&'a RemoteNetwork>,
        iface: Option<&'a str>,
        mux: &'a Multiplexer,
    ) -> Self {
        Self {
            state,
            network,
            iface,
            mux,
        }
    }

    /// Sends a command frame back to the peer.
    ///
    /// # Errors
    /// Returns `ConnectionClosed` once the connection is closing.
    pub async fn reply(&self, frame: &CommandFrame) -> TransportResult<()> {
        self.mux.send_command(frame).await
    }
}

// ============================================
// CommandHandler Trait
// ============================================

/// An extension command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handles one frame carrying this command.
    ///
    /// # Errors
    /// Any `CommandError`; its severity decides whether the session
    /// survives.
    async fn handle(
        &self,
        ctx: CommandContext<'_>,
        args: &[String],
    ) -> std::result::Result<(), CommandError>;
}

// ============================================
// CommandRegistry
// ============================================

/// Extension commands by name.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`.
    ///
    /// # Errors
    /// Returns `Registry` if the name is empty, reserved, or taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ClientError::registry(format!(
                "invalid command name '{name}'"
            )));
        }
        if CommandKind::from_name(&name).is_builtin() {
            return Err(ClientError::registry(format!(
                "'{name}' is a built-in command"
            )));
        }
        if self.handlers.contains_key(&name) {
            return Err(ClientError::registry(format!(
                "'{name}' is already registered"
            )));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Looks up a handler.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

// ============================================
// Tests
// ============================================
