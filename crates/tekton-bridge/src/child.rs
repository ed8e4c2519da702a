//! Child process lifecycle.
//!
//! The bridge owns exactly one child. The child is spawned with all three
//! standard streams piped, signaled with SIGTERM on teardown, escalated to
//! SIGKILL after a bounded grace period, and reaped exactly once --
//! `terminate` consumes the handle, so a second reap cannot compile.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::config::LaunchConfig;
use crate::error::BridgeError;

/// Grace period after SIGTERM before SIGKILL.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// A spawned child with its piped standard streams.
#[derive(Debug)]
pub struct BridgedChild {
    child: Child,
    /// Write end of the child's stdin; dropping it signals EOF to the child.
    pub stdin: Option<ChildStdin>,
    /// Read end of the child's stdout.
    pub stdout: Option<ChildStdout>,
    /// Read end of the child's stderr.
    pub stderr: Option<ChildStderr>,
}

impl BridgedChild {
    /// Spawn the configured executable with piped stdio.
    ///
    /// The identity/port environment contract is applied to the command
    /// before spawning, so the values are visible in the child's initial
    /// environment snapshot.
    pub fn spawn(config: &LaunchConfig) -> Result<Self, BridgeError> {
        let mut cmd = Command::new(&config.executable);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        tekton_core::env::apply_child_env(&mut cmd, config.tool_name.as_deref(), config.port);

        info!(
            executable = %config.executable.display(),
            args = ?config.args,
            tool = ?config.tool_name,
            port = ?config.port,
            "Spawning child"
        );
        let mut child = cmd.spawn().map_err(|e| BridgeError::Spawn {
            executable: config.executable.display().to_string(),
            reason: e.to_string(),
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
        })
    }

    /// OS process id, if the child has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the child to exit. Cancel safe; used as a `select!` branch
    /// so the relay loop observes child exit while blocked on stream IO.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Terminate and reap the child: SIGTERM, bounded grace wait, SIGKILL.
    ///
    /// Consumes the handle; this is the single reap point on every exit
    /// path. If the child already exited, the SIGTERM is a no-op and the
    /// wait returns the real exit status immediately.
    pub async fn terminate(mut self, grace: Duration) -> std::io::Result<ExitStatus> {
        // Drop our write end first so a child blocked reading stdin sees EOF.
        drop(self.stdin.take());

        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            // SAFETY: pid is a valid process ID obtained from our own Child
            // handle. kill(2) with SIGTERM is safe to call on an owned child.
            #[allow(unsafe_code)]
            #[allow(clippy::cast_possible_wrap)]
            let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            if ret != 0 {
                let err = std::io::Error::last_os_error();
                debug!(pid, error = %err, "SIGTERM not delivered (child likely exited)");
            }
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                debug!(?status, "Child exited after termination request");
                status
            }
            Err(_) => {
                warn!("Timeout waiting for graceful child exit, killing");
                self.child.kill().await?;
                self.child.wait().await
            }
        }
    }
}

/// Map an exit status to the launcher's own exit code.
///
/// A signal-killed child is reported as the conventional `128 + signo`.
pub fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status
            .code()
            .unwrap_or_else(|| status.signal().map_or(1, |signo| 128 + signo))
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(1)
    }
}

/// Drain a child's stderr into tracing output.
///
/// Socket-bridge mode does not relay stderr to the peer; draining it here
/// keeps the child from blocking on a full pipe and preserves diagnostics.
pub async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!("child stderr: {line}");
    }
    debug!("child stderr closed");
}
