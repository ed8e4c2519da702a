//! Tekton process bridge launcher.
//!
//! Spawns a child process with redirected standard streams and relays raw
//! bytes between the child and exactly one counterparty: the launcher's own
//! inherited stdio, or a single outbound connection to `127.0.0.1:<port>`.
//! The relay ends when the child exits, a stream closes, or the launcher
//! receives a termination signal; on every path the child is signaled and
//! reaped exactly once.

pub mod child;
pub mod config;
pub mod error;
pub mod relay;

pub use child::{exit_code, BridgedChild, TERMINATE_GRACE};
pub use config::{BridgeMode, LaunchConfig, RetryPolicy};
pub use error::BridgeError;

use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// How the top-level select loop ended.
enum Outcome {
    /// The relay (or connection establishment) finished or failed.
    Relay(Result<(), BridgeError>),
    /// SIGINT/SIGTERM was delivered to the launcher itself.
    Signaled,
}

/// Launch the configured child and bridge it until a terminal condition.
///
/// Returns the launcher's exit code: the child's exit status on normal
/// paths (`128 + signo` if the child died by signal), or `0` when torn down
/// by a signal delivered to the launcher. Startup failures (spawn error,
/// connection-retry timeout) surface as `Err`; the caller maps them to
/// exit code 1.
///
/// Signals are observed as `select!` branches in this function, never in a
/// handler: on delivery the relay future is dropped, the child is sent a
/// termination request, reaped, and `0` is returned.
pub async fn run(config: LaunchConfig, retry: RetryPolicy) -> Result<i32, BridgeError> {
    config.validate()?;

    // Listeners registered before the child exists, so no delivery window is
    // ever handled by the default disposition while a child is running.
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let mut child = BridgedChild::spawn(&config)?;

    let outcome = tokio::select! {
        res = drive(&mut child, &config, &retry) => Outcome::Relay(res),
        _ = sigint.recv() => Outcome::Signaled,
        _ = sigterm.recv() => Outcome::Signaled,
    };

    match outcome {
        Outcome::Signaled => {
            info!("Termination signal received, tearing down child");
            let _ = child.terminate(TERMINATE_GRACE).await;
            Ok(0)
        }
        Outcome::Relay(Err(e)) => {
            // Startup failed after the child was spawned; still reap it.
            let _ = child.terminate(TERMINATE_GRACE).await;
            Err(e)
        }
        Outcome::Relay(Ok(())) => {
            let status = child.terminate(TERMINATE_GRACE).await?;
            Ok(exit_code(status))
        }
    }
}

/// Connect (socket mode) and run the mode-appropriate relay loop.
async fn drive(
    child: &mut BridgedChild,
    config: &LaunchConfig,
    retry: &RetryPolicy,
) -> Result<(), BridgeError> {
    match config.mode() {
        BridgeMode::Socket(port) => {
            let stream = relay::connect_with_retry(port, retry).await?;
            relay::run_socket_bridge(child, stream).await
        }
        BridgeMode::Stdio => {
            relay::run_stdio_relay(
                child,
                tokio::io::stdin(),
                tokio::io::stdout(),
                tokio::io::stderr(),
            )
            .await
        }
    }
}
