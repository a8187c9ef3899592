// ============================================
// File: crates/wstun-client/src/main.rs
// ============================================
//! # wstun Client Entry Point
//!
//! ## Creation Reason
//! Main entry point for the tunnel client binary.
//! Handles CLI parsing, logging setup, and client execution.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Configuration loading with flag overrides
//! - Logging initialization with tracing
//! - Client execution and exit status
//!
//! ## Usage
//! ```bash
//! # Connect, credentials from a file
//! wstun-client connect --connect wss://vpn.example.net/tunnel --auth-file /etc/wstun/auth
//!
//! # Connect using a config file, route everything through the tunnel
//! wstun-client connect --config /etc/wstun/client.toml --default-gateway
//!
//! # Check a config file
//! wstun-client validate --config /etc/wstun/client.toml
//! ```
//!
//! ## Exit Status
//! - 0: peer closed the connection, Ctrl-C, or nothing to connect to
//! - 1: setup failed, or the session ended on an error
//!
//! ## ⚠️ Important Note for Next Developer
//! - Client requires root or CAP_NET_ADMIN for TUN/TAP and routes
//! - `RUST_LOG` overrides the configured log level
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wstun_client::{Client, ClientConfig, ClientError};

// ============================================
// CLI Definition
// ============================================

/// WebSocket TUN/TAP tunnel client
#[derive(Parser, Debug)]
#[command(name = "wstun-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to a tunnel endpoint and run until it closes
    Connect(ConnectArgs),

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/wstun/client.toml")]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ConnectArgs {
    /// Server address to connect to (ws:// or wss://)
    #[arg(long = "connect", value_name = "URL")]
    url: Option<String>,

    /// File to read authentication from in the format user:password
    #[arg(long)]
    auth_file: Option<String>,

    /// Script to run once the tunnel is online
    #[arg(long)]
    up_script: Option<String>,

    /// Script to run when the tunnel goes offline
    #[arg(long)]
    down_script: Option<String>,

    /// Route all traffic through the tunnel
    #[arg(long)]
    default_gateway: bool,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl ConnectArgs {
    /// Applies flag values over the file configuration.
    fn apply(self, config: &mut ClientConfig) {
        if self.url.is_some() {
            config.connection.url = self.url;
        }
        if self.auth_file.is_some() {
            config.connection.auth_file = self.auth_file;
        }
        if self.up_script.is_some() {
            config.scripts.up = self.up_script;
        }
        if self.down_script.is_some() {
            config.scripts.down = self.down_script;
        }
        if self.default_gateway {
            config.tunnel.default_gateway = true;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Execute command
    let result = match cli.command {
        Some(Commands::Connect(args)) => cmd_connect(args).await,
        Some(Commands::Validate { config }) => cmd_validate(config).await,
        None => print_usage(),
    };

    // Handle errors
    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            init_logging("info");
            error!("{:#}", e);
            if let Some(hint) = e.downcast_ref::<ClientError>().and_then(hint_for) {
                error!("{}", hint);
            }
            std::process::exit(1);
        }
    }
}

// ============================================
// Commands
// ============================================

/// Runs the tunnel.
async fn cmd_connect(args: ConnectArgs) -> anyhow::Result<i32> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path).await?,
        None => ClientConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    init_logging(&config.logging.level);

    if config.connection.url.is_none() {
        return print_usage();
    }

    let reason = Client::new(config).run().await?;
    if reason.is_failure() {
        error!("Tunnel closed: {}", reason);
        return Ok(1);
    }
    info!("Tunnel closed: {}", reason);
    Ok(0)
}

/// Validates configuration file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<i32> {
    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Client will use default values.");
        return Ok(0);
    }

    let config = ClientConfig::load(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Connection:");
    println!(
        "   URL:            {}",
        config.connection.url.as_deref().map_or("(none)", redact_url)
    );
    println!(
        "   Auth File:      {}",
        config.connection.auth_file.as_deref().unwrap_or("(none)")
    );
    match config.connection.ping_interval() {
        Some(interval) => println!("   Ping Interval:  {}s", interval.as_secs()),
        None => println!("   Ping Interval:  disabled"),
    }
    println!();
    println!("Tunnel:");
    println!("   Default Gateway: {}", config.tunnel.default_gateway);
    println!();
    println!("Scripts:");
    println!("   Up:    {}", config.scripts.up.as_deref().unwrap_or("(none)"));
    println!("   Down:  {}", config.scripts.down.as_deref().unwrap_or("(none)"));
    println!();

    Ok(0)
}

// ============================================
// Helpers
// ============================================

/// Prints help; having nothing to connect to is not an error.
fn print_usage() -> anyhow::Result<i32> {
    Cli::command().print_help()?;
    println!();
    Ok(0)
}

/// Follow-up advice for errors the user can act on.
fn hint_for(err: &ClientError) -> Option<&'static str> {
    if err.requires_privileges() {
        Some("Run as root or grant CAP_NET_ADMIN to create the interface and routes")
    } else if err.is_config_error() {
        Some("Check the configuration with `wstun-client validate --config <path>`")
    } else {
        None
    }
}

/// Hides userinfo in a URL meant for display.
fn redact_url(raw: &str) -> &str {
    if raw.contains('@') {
        "(contains credentials, hidden)"
    } else {
        raw
    }
}

/// Initializes logging.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use wstun_client::CommandError;
    use wstun_transport::TransportError;

    #[test]
    fn test_hint_for_errors() {
        let denied = ClientError::SessionFailed(CommandError::Setup(
            TransportError::PermissionDenied {
                operation: "open /dev/net/tun".into(),
            },
        ));
        assert!(hint_for(&denied).unwrap().contains("CAP_NET_ADMIN"));

        let invalid = ClientError::config_invalid("connection.url", "must be ws:// or wss://");
        assert!(hint_for(&invalid).unwrap().contains("validate"));

        assert!(hint_for(&ClientError::hook("/bin/up.sh", "exit status 1")).is_none());
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(redact_url("wss://vpn.example.net/tunnel"), "wss://vpn.example.net/tunnel");
        assert_eq!(redact_url("wss://user:pw@vpn.example.net/"), "(contains credentials, hidden)");
    }
}
