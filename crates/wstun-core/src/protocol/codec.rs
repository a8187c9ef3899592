// ============================================
// File: crates/wstun-core/src/protocol/codec.rs
// ============================================
//! # Command Frame Codec
//!
//! ## Creation Reason
//! Converts between the control channel's text frames and structured
//! `CommandFrame` values.
//!
//! ## Wire Format
//! ```text
//! <command> <arg1> <arg2> ...
//! ```
//! One command per transport message, tokens separated by whitespace.
//! The transport's message boundaries are the only framing.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Command names are case-sensitive; never normalize them
//! - Arguments cannot contain whitespace; there is no quoting
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use std::fmt;

use crate::error::{CoreError, Result};

// ============================================
// CommandFrame
// ============================================

/// An ordered textual command: a name plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    name: String,
    args: Vec<String>,
}

impl CommandFrame {
    /// Creates a frame from a name and arguments.
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Decodes a text frame.
    ///
    /// # Errors
    /// Returns `CoreError::EmptyFrame` if the text has no tokens.
    pub fn decode(text: &str) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let name = tokens.next().ok_or(CoreError::EmptyFrame)?;
        Ok(Self {
            name: name.to_string(),
            args: tokens.map(str::to_string).collect(),
        })
    }

    /// Encodes the frame as wire text.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(
            self.name.len() + self.args.iter().map(|a| a.len() + 1).sum::<usize>(),
        );
        out.push_str(&self.name);
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }

    /// Command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command arguments, in order.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_init() {
        let frame = CommandFrame::decode("init TUN 10.8.0.0/24 1400").unwrap();
        assert_eq!(frame.name(), "init");
        assert_eq!(frame.args(), ["TUN", "10.8.0.0/24", "1400"]);
    }

    #[test]
    fn test_decode_collapses_whitespace() {
        let frame = CommandFrame::decode("  addroute\t192.168.50.0/24 \n").unwrap();
        assert_eq!(frame.name(), "addroute");
        assert_eq!(frame.args().len(), 1);
    }

    #[test]
    fn test_decode_no_args() {
        let frame = CommandFrame::decode("addroute").unwrap();
        assert!(frame.args().is_empty());
    }

    #[test]
    fn test_decode_empty() {
        assert!(matches!(CommandFrame::decode(""), Err(CoreError::EmptyFrame)));
        assert!(matches!(CommandFrame::decode("   "), Err(CoreError::EmptyFrame)));
    }

    #[test]
    fn test_encode() {
        let frame = CommandFrame::new("addroute", ["192.168.50.0/24"]);
        assert_eq!(frame.encode(), "addroute 192.168.50.0/24");
        assert_eq!(CommandFrame::new("ping", Vec::<String>::new()).to_string(), "ping");
    }
}
