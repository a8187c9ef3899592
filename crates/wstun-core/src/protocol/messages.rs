// ============================================
// File: crates/wstun-core/src/protocol/messages.rs
// ============================================
//! # Protocol Commands
//!
//! ## Creation Reason
//! Turns a raw `CommandFrame` into a closed set of typed commands, each
//! carrying its validated argument payload.
//!
//! ## Main Functionality
//! - `CommandKind`: Classifies a frame by name without touching arguments
//! - `Command`: Tagged union of decoded commands
//! - `InitRequest`: Validated `init` payload
//! - `AddRouteRequest`: Validated `addroute` payload
//!
//! ## Command Reference
//! ```text
//! ┌──────────┬──────────────────────────────┬───────────┐
//! │ Command  │ Arguments                    │ State     │
//! ├──────────┼──────────────────────────────┼───────────┤
//! │ init     │ mode network mtu             │ Connected │
//! │ addroute │ cidr                         │ Active    │
//! └──────────┴──────────────────────────────┴───────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Classification is split from decoding on purpose: the session checks
//!   its state between `CommandKind::of` and `Command::decode`, so a
//!   state error always wins over an argument error
//!
//! ## Last Modified
//! v0.1.0 - Initial command definitions

use std::str::FromStr;

use ipnet::Ipv4Net;
use wstun_common::{RemoteNetwork, TunnelMode};

use crate::error::{CoreError, Result};
use crate::protocol::codec::CommandFrame;

// ============================================
// Constants
// ============================================

/// Name of the built-in init command.
pub const INIT_COMMAND: &str = "init";

/// Name of the built-in addroute command.
pub const ADDROUTE_COMMAND: &str = "addroute";

/// Number of arguments `init` takes.
pub const INIT_ARG_COUNT: usize = 3;

/// Number of arguments `addroute` takes.
pub const ADDROUTE_ARG_COUNT: usize = 1;

// ============================================
// CommandKind
// ============================================

/// Which command a frame names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `init`
    Init,
    /// `addroute`
    AddRoute,
    /// Anything else
    Other,
}

impl CommandKind {
    /// Classifies a frame by its command name.
    #[must_use]
    pub fn of(frame: &CommandFrame) -> Self {
        Self::from_name(frame.name())
    }

    /// Classifies a command name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            INIT_COMMAND => Self::Init,
            ADDROUTE_COMMAND => Self::AddRoute,
            _ => Self::Other,
        }
    }

    /// Returns `true` for names handled by the session itself.
    #[must_use]
    pub const fn is_builtin(self) -> bool {
        !matches!(self, Self::Other)
    }
}

// ============================================
// InitRequest
// ============================================

/// Validated arguments of `init mode network mtu`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitRequest {
    /// Requested tunnel mode.
    pub mode: TunnelMode,
    /// Negotiated addressing record.
    pub network: RemoteNetwork,
    /// Interface MTU.
    pub mtu: u16,
}

impl InitRequest {
    /// Validates `init` arguments.
    ///
    /// # Errors
    /// - `WrongArgCount` unless exactly three arguments are given
    /// - `Common` for an unknown mode or malformed network
    /// - `InvalidMtu` for a non-integer, zero or out-of-range MTU
    pub fn parse(args: &[String]) -> Result<Self> {
        let [mode, network, mtu] = args else {
            return Err(CoreError::wrong_arg_count(INIT_COMMAND, INIT_ARG_COUNT));
        };

        let mode = TunnelMode::from_str(mode)?;
        let network = RemoteNetwork::parse(network)?;
        let mtu = parse_mtu(mtu)?;

        Ok(Self { mode, network, mtu })
    }

    /// Re-encodes the request as a frame.
    #[must_use]
    pub fn to_frame(&self) -> CommandFrame {
        CommandFrame::new(
            INIT_COMMAND,
            [
                self.mode.as_str().to_string(),
                self.network.as_str().to_string(),
                self.mtu.to_string(),
            ],
        )
    }
}

fn parse_mtu(raw: &str) -> Result<u16> {
    let value: u32 = raw
        .parse()
        .map_err(|e: std::num::ParseIntError| CoreError::invalid_mtu(raw, e.to_string()))?;
    if value == 0 {
        return Err(CoreError::invalid_mtu(raw, "must be positive"));
    }
    u16::try_from(value).map_err(|_| CoreError::invalid_mtu(raw, "exceeds 65535"))
}

// ============================================
// AddRouteRequest
// ============================================

/// Validated argument of `addroute cidr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddRouteRequest {
    /// Destination network, host bits cleared.
    pub destination: Ipv4Net,
}

impl AddRouteRequest {
    /// Validates `addroute` arguments.
    ///
    /// # Errors
    /// - `WrongArgCount` unless exactly one argument is given
    /// - `InvalidRoute` if the argument is not IPv4 CIDR
    pub fn parse(args: &[String]) -> Result<Self> {
        let [cidr] = args else {
            return Err(CoreError::wrong_arg_count(ADDROUTE_COMMAND, ADDROUTE_ARG_COUNT));
        };

        let destination = Ipv4Net::from_str(cidr)
            .map_err(|e| CoreError::invalid_route(cidr.as_str(), e.to_string()))?
            .trunc();

        Ok(Self { destination })
    }

    /// Re-encodes the request as a frame.
    #[must_use]
    pub fn to_frame(&self) -> CommandFrame {
        CommandFrame::new(ADDROUTE_COMMAND, [self.destination.to_string()])
    }
}

// ============================================
// Command
// ============================================

/// A decoded command with validated payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `init`
    Init(InitRequest),
    /// `addroute`
    AddRoute(AddRouteRequest),
    /// Any other name; arguments are left to an extension handler.
    Other(CommandFrame),
}

impl Command {
    /// Decodes a frame into a typed command.
    ///
    /// # Errors
    /// Returns the argument validation error of the named built-in.
    pub fn decode(frame: CommandFrame) -> Result<Self> {
        match CommandKind::of(&frame) {
            CommandKind::Init => InitRequest::parse(frame.args()).map(Self::Init),
            CommandKind::AddRoute => AddRouteRequest::parse(frame.args()).map(Self::AddRoute),
            CommandKind::Other => Ok(Self::Other(frame)),
        }
    }

    /// Command name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Init(_) => INIT_COMMAND,
            Self::AddRoute(_) => ADDROUTE_COMMAND,
            Self::Other(frame) => frame.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_init_parse() {
        let req = InitRequest::parse(&args(&["TUN", "10.8.0.0/24", "1400"])).unwrap();
        assert_eq!(req.mode, TunnelMode::Tun);
        assert_eq!(req.network.as_str(), "10.8.0.0/24");
        assert_eq!(req.mtu, 1400);
        assert_eq!(req.to_frame().encode(), "init TUN 10.8.0.0/24 1400");
    }

    #[test]
    fn test_init_arity() {
        let err = InitRequest::parse(&args(&["TUN", "10.8.0.0/24"])).unwrap_err();
        assert_eq!(err.to_string(), "init needs 3 arguments");
    }

    #[test]
    fn test_init_bad_mtu() {
        for bad in ["abc", "0", "-5", "70000", "14.5"] {
            let err = InitRequest::parse(&args(&["TUN", "10.8.0.0/24", bad])).unwrap_err();
            assert!(matches!(err, CoreError::InvalidMtu { .. }), "{bad}");
        }
    }

    #[test]
    fn test_init_bad_network_and_mode() {
        assert!(InitRequest::parse(&args(&["TUN", "10.8.0.0", "1400"])).is_err());
        assert!(InitRequest::parse(&args(&["GRE", "10.8.0.0/24", "1400"])).is_err());
    }

    #[test]
    fn test_addroute_parse() {
        let req = AddRouteRequest::parse(&args(&["192.168.50.7/24"])).unwrap();
        assert_eq!(req.destination.to_string(), "192.168.50.0/24");
    }

    #[test]
    fn test_addroute_arity() {
        for list in [&[][..], &["10.0.0.0/8", "10.1.0.0/16"][..]] {
            let err = AddRouteRequest::parse(&args(list)).unwrap_err();
            assert_eq!(err.to_string(), "addroute needs 1 argument");
        }
    }

    #[test]
    fn test_addroute_bad_cidr() {
        let err = AddRouteRequest::parse(&args(&["192.168.50.0"])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRoute { .. }));
    }

    #[test]
    fn test_command_decode() {
        let cmd = Command::decode(CommandFrame::decode("addroute 10.0.0.0/8").unwrap()).unwrap();
        assert!(matches!(cmd, Command::AddRoute(_)));
        assert_eq!(cmd.name(), "addroute");

        let cmd = Command::decode(CommandFrame::decode("stats now").unwrap()).unwrap();
        assert!(matches!(cmd, Command::Other(_)));
        assert_eq!(cmd.name(), "stats");
    }

    #[test]
    fn test_kind_is_case_sensitive() {
        assert_eq!(CommandKind::from_name("init"), CommandKind::Init);
        assert_eq!(CommandKind::from_name("INIT"), CommandKind::Other);
        assert!(CommandKind::AddRoute.is_builtin());
    }
}
