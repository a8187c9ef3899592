// ============================================
// File: crates/wstun-transport/src/ip.rs
// ============================================
//! # `ip` Command Runner
//!
//! ## Creation Reason
//! Device addressing and routes are configured through iproute2. This
//! wraps the subprocess call so the device and route adapters share one
//! error path.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Uses `tokio::process`; never block the runtime on `ip`
//! - The returned error string is stderr, trimmed, for log/route errors
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![cfg(target_os = "linux")]

use tokio::process::Command;
use tracing::trace;

/// Runs `ip <args>` and returns stderr as the error on failure.
pub(crate) async fn run(args: &[&str]) -> Result<(), String> {
    trace!(?args, "Running ip");

    let output = Command::new("ip")
        .args(args)
        .output()
        .await
        .map_err(|e| format!("failed to spawn ip: {e}"))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(format!("ip {} ({}): {}", args.join(" "), output.status, stderr.trim()))
}
