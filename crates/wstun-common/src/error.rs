// ============================================
// File: crates/wstun-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Provides the base error type for parsing and validating the values
//! shared by every wstun crate (addressing records, tunnel modes).
//!
//! ## Main Functionality
//! - `CommonError`: Base error enum for shared operations
//! - `Result<T>`: Type alias using `CommonError`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Higher crates wrap this with `#[from]`; keep variants coarse
//! - Messages end up in peer-visible logs, never include credentials
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

// ============================================
// CommonError
// ============================================

/// Common error types shared across wstun crates.
///
/// # Example
/// ```
/// use wstun_common::error::CommonError;
/// use wstun_common::RemoteNetwork;
///
/// let err: CommonError = "10.8.0/24".parse::<RemoteNetwork>().unwrap_err();
/// assert!(matches!(err, CommonError::InvalidNetwork { .. }));
/// ```
#[derive(Error, Debug)]
pub enum CommonError {
    // ========================================
    // Validation Errors
    // ========================================

    /// A subnet/CIDR string could not be parsed.
    #[error("Invalid network '{input}': {reason}")]
    InvalidNetwork {
        /// The text that failed to parse
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Unknown tunnel mode token.
    #[error("Unknown tunnel mode '{0}' (expected TUN, TAP or TAP_NOCONF)")]
    UnknownMode(String),
}

impl CommonError {
    /// Creates an `InvalidNetwork` error.
    pub fn invalid_network(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNetwork {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommonError::invalid_network("10.0.0/24", "invalid IP address syntax");
        assert!(err.to_string().contains("10.0.0/24"));

        let err = CommonError::UnknownMode("TUNX".into());
        assert!(err.to_string().contains("TUNX"));
    }
}
