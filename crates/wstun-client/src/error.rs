// ============================================
// File: crates/wstun-client/src/error.rs
// ============================================
//! # Client Error Types
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use wstun_core::error::CoreError;
use wstun_transport::error::TransportError;

use crate::services::session::SessionState;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error types.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        path: String,
        reason: String,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        field: String,
        reason: String,
    },

    #[error("Failed to read auth file '{path}': {reason}")]
    AuthFile {
        path: String,
        reason: String,
    },

    #[error("Command registry: {reason}")]
    Registry {
        reason: String,
    },

    #[error("Hook '{script}' failed: {reason}")]
    Hook {
        script: String,
        reason: String,
    },

    #[error("Session failed: {0}")]
    SessionFailed(#[from] CommandError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn auth_file(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AuthFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn registry(reason: impl Into<String>) -> Self {
        Self::Registry {
            reason: reason.into(),
        }
    }

    pub fn hook(script: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Hook {
            script: script.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for configuration and credential errors.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigInvalid { .. } | Self::AuthFile { .. }
        )
    }

    /// Returns `true` if the OS refused the interface or a route for lack
    /// of privileges.
    #[must_use]
    pub const fn requires_privileges(&self) -> bool {
        match self {
            Self::Transport(e) | Self::SessionFailed(CommandError::Setup(e)) => {
                e.requires_privileges()
            }
            _ => false,
        }
    }
}

// ============================================
// CommandError
// ============================================

/// How a failed command affects the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The session cannot continue; teardown follows.
    Fatal,
    /// Reported, session continues.
    Recoverable,
    /// Rejected without touching session state.
    ProtocolViolation,
}

/// Failure of one control-channel command.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Cannot addroute before init")]
    AddRouteBeforeInit,

    #[error("Duplicate init: session is already {state}")]
    AlreadyInitialized {
        state: SessionState,
    },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// `init` arguments did not validate.
    #[error("Invalid init: {0}")]
    InvalidInit(#[source] CoreError),

    /// Non-init arguments did not validate.
    #[error(transparent)]
    InvalidArguments(CoreError),

    /// Device creation or configuration during `init`.
    #[error("Interface setup failed: {0}")]
    Setup(#[source] TransportError),

    /// Route install during `addroute`.
    #[error(transparent)]
    Route(TransportError),

    #[error("{command} failed: {reason}")]
    Handler {
        command: String,
        reason: String,
    },
}

impl CommandError {
    /// Classifies the error.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::InvalidInit(_) | Self::Setup(_) => Severity::Fatal,
            Self::AlreadyInitialized { .. } | Self::UnknownCommand(_) => {
                Severity::ProtocolViolation
            }
            Self::AddRouteBeforeInit
            | Self::InvalidArguments(_)
            | Self::Route(_)
            | Self::Handler { .. } => Severity::Recoverable,
        }
    }

    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.severity(), Severity::Fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::config_load("/etc/wstun/client.toml", "file not found");
        assert!(err.to_string().contains("/etc/wstun/client.toml"));

        assert_eq!(
            CommandError::AddRouteBeforeInit.to_string(),
            "Cannot addroute before init"
        );
        assert_eq!(
            CommandError::InvalidArguments(CoreError::wrong_arg_count("addroute", 1)).to_string(),
            "addroute needs 1 argument"
        );
    }

    #[test]
    fn test_command_severity() {
        assert_eq!(CommandError::AddRouteBeforeInit.severity(), Severity::Recoverable);
        assert_eq!(
            CommandError::UnknownCommand("x".into()).severity(),
            Severity::ProtocolViolation
        );
        assert_eq!(
            CommandError::AlreadyInitialized {
                state: SessionState::Active
            }
            .severity(),
            Severity::ProtocolViolation
        );
        assert!(CommandError::InvalidInit(CoreError::invalid_mtu("x", "bad")).is_fatal());
        assert!(
            CommandError::Setup(TransportError::device_create_failed("tun%d", "denied")).is_fatal()
        );
    }

    #[test]
    fn test_error_classification() {
        let config_err = ClientError::config_invalid("connection.url", "must be ws:// or wss://");
        assert!(config_err.is_config_error());
        assert!(!config_err.requires_privileges());

        let denied = TransportError::PermissionDenied {
            operation: "open /dev/net/tun".into(),
        };
        let setup_err = ClientError::SessionFailed(CommandError::Setup(denied));
        assert!(setup_err.requires_privileges());
        assert!(!setup_err.is_config_error());
        assert!(!ClientError::hook("/bin/up.sh", "exit status 1").requires_privileges());
    }
}
