// ============================================
// File: crates/wstun-client/src/services/hooks.rs
// ============================================
//! # Lifecycle Hooks
//!
//! ## Creation Reason
//! Runs the operator's "up" and "down" scripts when the tunnel comes up
//! and before it goes away.
//!
//! ## Main Functionality
//! - `HookRunner`: executes one hook invocation
//! - `ScriptRunner`: runs `<script> <up|down> <network> <iface>` as a
//!   child process with inherited stdio
//! - `LifecycleHooks`: the up hook is spawned and never awaited; the down
//!   hook is awaited
//!
//! ## ⚠️ Important Note for Next Developer
//! - Hook failures are logged and never end the session
//! - An empty script path means "no hook"
//!
//! ## Last Modified
//! v0.1.0 - Initial lifecycle hooks

use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use wstun_common::HookOp;

use crate::error::{ClientError, Result};

// ============================================
// HookRunner Trait
// ============================================

/// Executes a lifecycle hook.
#[async_trait]
pub trait HookRunner: Send + Sync {
    /// Runs `script` for `op`.
    ///
    /// # Errors
    /// Returns `Hook` if the script cannot be started or exits non-zero.
    async fn run(&self, script: &str, op: HookOp, network: &str, iface: &str) -> Result<()>;
}

/// Runs hooks as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptRunner;

#[async_trait]
impl HookRunner for ScriptRunner {
    async fn run(&self, script: &str, op: HookOp, network: &str, iface: &str) -> Result<()> {
        debug!(script, op = op.as_str(), network, iface, "Running hook");

        let status = Command::new(script)
            .arg(op.as_str())
            .arg(network)
            .arg(iface)
            .status()
            .await
            .map_err(|e| ClientError::hook(script, e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(ClientError::hook(script, status.to_string()))
        }
    }
}

// ============================================
// LifecycleHooks
// ============================================

/// Configured up/down scripts plus the runner that executes them.
#[derive(Clone)]
pub struct LifecycleHooks {
    up: Option<String>,
    down: Option<String>,
    runner: Arc<dyn HookRunner>,
}

impl LifecycleHooks {
    /// Creates hooks run by `ScriptRunner`.
    #[must_use]
    pub fn new(up: Option<String>, down: Option<String>) -> Self {
        Self::with_runner(up, down, Arc::new(ScriptRunner))
    }

    /// Creates hooks with a custom runner.
    #[must_use]
    pub fn with_runner(
        up: Option<String>,
        down: Option<String>,
        runner: Arc<dyn HookRunner>,
    ) -> Self {
        Self {
            up: up.filter(|s| !s.is_empty()),
            down: down.filter(|s| !s.is_empty()),
            runner,
        }
    }

    /// No hooks.
    #[must_use]
    pub fn none() -> Self {
        Self::new(None, None)
    }

    /// Starts the up hook in its own task.
    ///
    /// # Returns
    /// The task handle, or `None` when no up script is configured.
    pub fn spawn_up(&self, network: &str, iface: &str) -> Option<JoinHandle<()>> {
        let script = self.up.clone()?;
        let runner = Arc::clone(&self.runner);
        let network = network.to_string();
        let iface = iface.to_string();

        Some(tokio::spawn(async move {
            match runner.run(&script, HookOp::Up, &network, &iface).await {
                Ok(()) => info!(script = %script, iface = %iface, "Up hook finished"),
                Err(e) => warn!("{}", e),
            }
        }))
    }

    /// Runs the down hook to completion. Failures are logged.
    pub async fn run_down(&self, network: &str, iface: &str) {
        let Some(script) = self.down.as_deref() else {
            return;
        };
        match self.runner.run(script, HookOp::Down, network, iface).await {
            Ok(()) => info!(script, iface, "Down hook finished"),
            Err(e) => warn!("{}", e),
        }
    }

    /// Returns `true` if an up script is configured.
    #[must_use]
    pub fn has_up(&self) -> bool {
        self.up.is_some()
    }

    /// Returns `true` if a down script is configured.
    #[must_use]
    pub fn has_down(&self) -> bool {
        self.down.is_some()
    }
}

impl Default for LifecycleHooks {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("up", &self.up)
            .field("down", &self.down)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, HookOp, String, String)>>,
    }

    #[async_trait]
    impl HookRunner for Recorder {
        async fn run(&self, script: &str, op: HookOp, network: &str, iface: &str) -> Result<()> {
            self.calls
                .lock()
                .push((script.into(), op, network.into(), iface.into()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_empty_paths_are_noops() {
        let recorder = Arc::new(Recorder::default());
        let hooks = LifecycleHooks::with_runner(Some(String::new()), None, recorder.clone());

        assert!(!hooks.has_up());
        assert!(hooks.spawn_up("10.8.0.0/24", "tun0").is_none());
        hooks.run_down("10.8.0.0/24", "tun0").await;
        assert!(recorder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_hook_arguments() {
        let recorder = Arc::new(Recorder::default());
        let hooks = LifecycleHooks::with_runner(
            Some("/etc/wstun/up.sh".into()),
            Some("/etc/wstun/down.sh".into()),
            recorder.clone(),
        );

        hooks.spawn_up("10.8.0.0/24", "tun0").unwrap().await.unwrap();
        hooks.run_down("10.8.0.0/24", "tun0").await;

        let calls = recorder.calls.lock().clone();
        assert_eq!(
            calls,
            vec![
                ("/etc/wstun/up.sh".into(), HookOp::Up, "10.8.0.0/24".into(), "tun0".into()),
                ("/etc/wstun/down.sh".into(), HookOp::Down, "10.8.0.0/24".into(), "tun0".into()),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_outlives_cancelled_run() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        let slow = dir.path().join("slow.sh");
        std::fs::write(
            &slow,
            format!("#!/bin/sh\nsleep 0.2\ntouch {}\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&slow, std::fs::Permissions::from_mode(0o755)).unwrap();

        let run = ScriptRunner.run(slow.to_str().unwrap(), HookOp::Up, "10.8.0.0/24", "tun0");
        assert!(tokio::time::timeout(Duration::from_millis(50), run).await.is_err());

        for _ in 0..40 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_runner_exit_status() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("args");
        let ok = dir.path().join("ok.sh");
        std::fs::write(&ok, format!("#!/bin/sh\necho \"$@\" > {}\n", out.display())).unwrap();
        let fail = dir.path().join("fail.sh");
        std::fs::write(&fail, "#!/bin/sh\nexit 3\n").unwrap();
        for script in [&ok, &fail] {
            std::fs::set_permissions(script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        ScriptRunner
            .run(ok.to_str().unwrap(), HookOp::Down, "10.8.0.0/24", "tun0")
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap().trim(), "down 10.8.0.0/24 tun0");

        let err = ScriptRunner
            .run(fail.to_str().unwrap(), HookOp::Up, "10.8.0.0/24", "tun0")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Hook { .. }));

        assert!(ScriptRunner
            .run("/nonexistent/hook.sh", HookOp::Up, "10.8.0.0/24", "tun0")
            .await
            .is_err());
    }
}
