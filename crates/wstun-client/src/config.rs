// ============================================
// File: crates/wstun-client/src/config.rs
// ============================================
//! # Client Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the tunnel client, from an
//! optional TOML file overridden by command-line flags.
//!
//! ## Main Functionality
//! - `ClientConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Conversion into multiplexer, session and hook settings
//!
//! ## Configuration Sections
//! - `connection`: endpoint URL, credentials file, keepalive, queue sizes
//! - `tunnel`: default gateway switch
//! - `scripts`: up/down lifecycle scripts
//! - `logging`: log level
//!
//! ## Example Configuration
//! ```toml
//! [connection]
//! url = "wss://vpn.example.net/tunnel"
//! auth_file = "/etc/wstun/auth"
//! ping_interval_secs = 30
//!
//! [tunnel]
//! default_gateway = true
//!
//! [scripts]
//! up = "/etc/wstun/up.sh"
//! down = "/etc/wstun/down.sh"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `connection.url` may carry `user:password@`; never log it unsanitized
//! - An empty script path is the same as no script
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::error::{ClientError, Result};
use crate::services::binding::DEFAULT_PACKET_QUEUE;
use crate::services::hooks::LifecycleHooks;
use crate::services::multiplexer::{MultiplexerConfig, DEFAULT_OUTBOUND_QUEUE};
use crate::services::session::SessionOptions;

// ============================================
// ClientConfig
// ============================================

/// Main client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Tunnel behaviour.
    #[serde(default)]
    pub tunnel: TunnelConfig,

    /// Lifecycle scripts.
    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ClientError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ClientError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string.
    ///
    /// # Errors
    /// Returns error if the text cannot be parsed or validated.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Multiplexer settings.
    #[must_use]
    pub fn multiplexer(&self) -> MultiplexerConfig {
        MultiplexerConfig {
            outbound_queue: self.connection.outbound_queue,
            ping_interval: self.connection.ping_interval(),
        }
    }

    /// Session settings.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            default_gateway: self.tunnel.default_gateway,
            packet_queue: self.connection.packet_queue,
        }
    }

    /// Lifecycle hooks run as child processes.
    #[must_use]
    pub fn hooks(&self) -> LifecycleHooks {
        LifecycleHooks::new(self.scripts.up.clone(), self.scripts.down.clone())
    }
}

// ============================================
// ConnectionConfig
// ============================================

/// Connection configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Endpoint URL (`ws://` or `wss://`). No URL means nothing to do.
    #[serde(default)]
    pub url: Option<String>,

    /// File holding `user:password` or `user`.
    #[serde(default)]
    pub auth_file: Option<String>,

    /// Keepalive ping interval; 0 disables pings.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Outbound queue depth shared by commands and packets.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Inbound packet queue depth of the interface.
    #[serde(default = "default_packet_queue")]
    pub packet_queue: usize,
}

fn default_ping_interval() -> u64 {
    30
}

fn default_outbound_queue() -> usize {
    DEFAULT_OUTBOUND_QUEUE
}

fn default_packet_queue() -> usize {
    DEFAULT_PACKET_QUEUE
}

impl ConnectionConfig {
    fn validate(&self) -> Result<()> {
        if let Some(raw) = &self.url {
            let url = Url::parse(raw)
                .map_err(|e| ClientError::config_invalid("connection.url", e.to_string()))?;
            if !matches!(url.scheme(), "ws" | "wss") {
                return Err(ClientError::config_invalid(
                    "connection.url",
                    "scheme must be ws or wss",
                ));
            }
        }

        if self.outbound_queue == 0 {
            return Err(ClientError::config_invalid(
                "connection.outbound_queue",
                "must be at least 1",
            ));
        }

        if self.packet_queue == 0 {
            return Err(ClientError::config_invalid(
                "connection.packet_queue",
                "must be at least 1",
            ));
        }

        Ok(())
    }

    /// Keepalive interval, `None` when disabled.
    #[must_use]
    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_secs > 0).then(|| Duration::from_secs(self.ping_interval_secs))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            auth_file: None,
            ping_interval_secs: default_ping_interval(),
            outbound_queue: default_outbound_queue(),
            packet_queue: default_packet_queue(),
        }
    }
}

// ============================================
// TunnelConfig
// ============================================

/// Tunnel configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Route all traffic through the tunnel.
    #[serde(default)]
    pub default_gateway: bool,
}

// ============================================
// ScriptsConfig
// ============================================

/// Lifecycle scripts section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Run once the tunnel is up.
    #[serde(default)]
    pub up: Option<String>,

    /// Run before the interface goes away.
    #[serde(default)]
    pub down: Option<String>,
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    fn validate(&self) -> Result<()> {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ClientError::config_invalid(
                "logging.level",
                "must be one of trace, debug, info, warn, error",
            )),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.connection.url.is_none());
        assert_eq!(config.connection.ping_interval(), Some(Duration::from_secs(30)));
        assert!(!config.tunnel.default_gateway);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full() {
        let config = ClientConfig::from_toml(
            r#"
            [connection]
            url = "wss://vpn.example.net/tunnel"
            auth_file = "/etc/wstun/auth"
            ping_interval_secs = 0
            outbound_queue = 64

            [tunnel]
            default_gateway = true

            [scripts]
            up = "/etc/wstun/up.sh"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.url.as_deref(), Some("wss://vpn.example.net/tunnel"));
        assert_eq!(config.connection.ping_interval(), None);
        assert_eq!(config.multiplexer().outbound_queue, 64);
        assert!(config.session_options().default_gateway);
        assert_eq!(config.session_options().packet_queue, DEFAULT_PACKET_QUEUE);
        assert!(config.hooks().has_up());
        assert!(!config.hooks().has_down());
    }

    #[test]
    fn test_validation_errors() {
        let bad_scheme = ClientConfig::from_toml(
            r#"
            [connection]
            url = "https://vpn.example.net"
            "#,
        );
        assert!(matches!(bad_scheme, Err(ClientError::ConfigInvalid { .. })));

        let zero_queue = ClientConfig::from_toml(
            r#"
            [connection]
            outbound_queue = 0
            "#,
        );
        assert!(zero_queue.is_err());

        let bad_level = ClientConfig::from_toml(
            r#"
            [logging]
            level = "loud"
            "#,
        );
        assert!(bad_level.is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_values() {
        let mut config = ClientConfig::default();
        config.connection.url = Some("ws://127.0.0.1:9000".into());
        config.scripts.down = Some("/bin/down.sh".into());

        let reparsed = ClientConfig::from_toml(&config.to_toml()).unwrap();
        assert_eq!(reparsed.connection.url, config.connection.url);
        assert_eq!(reparsed.scripts.down, config.scripts.down);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "[tunnel]\ndefault_gateway = true\n").unwrap();

        let config = ClientConfig::load(&path).await.unwrap();
        assert!(config.tunnel.default_gateway);

        let missing = ClientConfig::load(dir.path().join("missing.toml")).await;
        assert!(matches!(missing, Err(ClientError::ConfigLoad { .. })));
    }
}
