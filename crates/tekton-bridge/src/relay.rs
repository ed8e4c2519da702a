//! Byte relay loops.
//!
//! A bridge is a single task multiplexing over a small fixed set of sources
//! with `select!`. Bytes move one chunk at a time with no framing and no
//! interpretation; within one direction source order is preserved, across
//! directions nothing is ordered. End-of-stream and I/O errors are relay
//! state transitions, not failures: the only errors that surface from here
//! are the bounded connection-retry timeout and a missing stream handle.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use crate::child::{drain_stderr, BridgedChild};
use crate::config::RetryPolicy;
use crate::error::BridgeError;

/// Transfer buffer size per direction.
const CHUNK: usize = 4096;

/// Per-read bound for the post-exit drain. A dead child's pipe ends are
/// closed, so reads hit EOF immediately; the bound covers a grandchild that
/// inherited the write end and would otherwise hold the relay open.
const EXIT_DRAIN_WINDOW: Duration = Duration::from_millis(200);

/// Forward whatever the exited child left buffered in `reader`.
async fn drain_after_exit<R, W>(reader: &mut R, writer: &mut W, buf: &mut [u8])
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        match timeout(EXIT_DRAIN_WINDOW, reader.read(buf)).await {
            Ok(Ok(n)) if n > 0 => {
                if writer.write_all(&buf[..n]).await.is_err() {
                    break;
                }
            }
            _ => break,
        }
    }
    writer.flush().await.ok();
}

/// Connect outbound to `127.0.0.1:<port>`, retrying refused connections on a
/// fixed interval up to the policy's attempt bound.
///
/// The peer listener is assumed to already be binding; exhausting the window
/// is a terminal startup failure. Errors other than refusal are not retried.
pub async fn connect_with_retry(
    port: u16,
    policy: &RetryPolicy,
) -> Result<TcpStream, BridgeError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let mut attempts: u32 = 0;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                info!(%addr, attempts, "Connected to bridge peer");
                return Ok(stream);
            }
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                attempts += 1;
                if !policy.should_retry(attempts) {
                    return Err(BridgeError::ConnectTimeout { port, attempts });
                }
                debug!(%addr, attempts, "Connection refused, retrying");
                sleep(policy.interval).await;
            }
            Err(e) => return Err(BridgeError::Io(e)),
        }
    }
}

/// Socket-bridge relay: peer socket <-> child stdin/stdout.
///
/// Either side reaching end-of-stream or erroring terminates the relay, as
/// does child exit; on exit the child's remaining buffered stdout is relayed
/// before the loop ends. Child stderr is not bridged to the peer; it is
/// drained into tracing output so the child cannot block on a full pipe.
pub async fn run_socket_bridge(
    child: &mut BridgedChild,
    stream: TcpStream,
) -> Result<(), BridgeError> {
    let mut child_stdin = child.stdin.take();
    let mut child_stdout = child
        .stdout
        .take()
        .ok_or(BridgeError::StreamUnavailable { stream: "stdout" })?;
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(drain_stderr(stderr));
    }

    let (mut sock_rd, mut sock_wr) = stream.into_split();
    let mut net_buf = vec![0u8; CHUNK];
    let mut out_buf = vec![0u8; CHUNK];

    loop {
        tokio::select! {
            res = sock_rd.read(&mut net_buf) => match res {
                Ok(0) => {
                    debug!("peer closed connection");
                    break;
                }
                Ok(n) => {
                    let failed = match child_stdin.as_mut() {
                        Some(w) => w.write_all(&net_buf[..n]).await.is_err(),
                        None => false,
                    };
                    if failed {
                        debug!("child stdin closed");
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "connection read ended");
                    break;
                }
            },
            res = child_stdout.read(&mut out_buf) => match res {
                Ok(0) => {
                    debug!("child stdout closed");
                    break;
                }
                Ok(n) => {
                    if sock_wr.write_all(&out_buf[..n]).await.is_err() {
                        debug!("connection write ended");
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "child stdout read ended");
                    break;
                }
            },
            status = child.wait() => {
                debug!(?status, "child exited");
                // The exit branch can win the race against a final stdout
                // write; pick up what the child left behind before ending.
                drain_after_exit(&mut child_stdout, &mut sock_wr, &mut out_buf).await;
                break;
            }
        }
    }
    Ok(())
}

/// Stdio relay: caller-supplied streams <-> child stdin/stdout/stderr.
///
/// The launcher binary passes its own stdio here; tests pass in-memory
/// duplex streams. Per-source lifecycle:
///
/// - EOF on `input` closes the child's stdin exactly once (child sees EOF)
///   and disables the branch; it does not terminate the relay.
/// - EOF on child stdout terminates the relay (the child is done producing
///   output).
/// - EOF on child stderr disables only the stderr branch.
/// - Child exit drains whatever output remains buffered, then terminates
///   the relay.
pub async fn run_stdio_relay<I, O, E>(
    child: &mut BridgedChild,
    mut input: I,
    mut output: O,
    mut err_sink: E,
) -> Result<(), BridgeError>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut child_stdin = child.stdin.take();
    let mut child_stdout = child
        .stdout
        .take()
        .ok_or(BridgeError::StreamUnavailable { stream: "stdout" })?;
    let mut child_stderr = child.stderr.take();

    let mut in_buf = vec![0u8; CHUNK];
    let mut out_buf = vec![0u8; CHUNK];
    let mut err_buf = vec![0u8; CHUNK];

    loop {
        tokio::select! {
            res = input.read(&mut in_buf), if child_stdin.is_some() => match res {
                Ok(0) => {
                    // Dropping the write end delivers EOF to the child; after
                    // this the branch is disabled and never writes again.
                    debug!("input EOF, closing child stdin");
                    child_stdin = None;
                }
                Ok(n) => {
                    let failed = match child_stdin.as_mut() {
                        Some(w) => {
                            w.write_all(&in_buf[..n]).await.is_err()
                        }
                        None => false,
                    };
                    if failed {
                        debug!("child stdin closed");
                        child_stdin = None;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "input read ended");
                    child_stdin = None;
                }
            },
            res = child_stdout.read(&mut out_buf) => match res {
                Ok(0) => {
                    debug!("child stdout closed");
                    break;
                }
                Ok(n) => {
                    if output.write_all(&out_buf[..n]).await.is_err() {
                        break;
                    }
                    output.flush().await.ok();
                }
                Err(e) => {
                    debug!(error = %e, "child stdout read ended");
                    break;
                }
            },
            res = async {
                match child_stderr.as_mut() {
                    Some(r) => r.read(&mut err_buf).await,
                    // Unreachable: branch is disabled when the handle is gone.
                    None => std::future::pending().await,
                }
            }, if child_stderr.is_some() => match res {
                Ok(0) => {
                    debug!("child stderr closed");
                    child_stderr = None;
                }
                Ok(n) => {
                    if err_sink.write_all(&err_buf[..n]).await.is_err() {
                        child_stderr = None;
                    } else {
                        err_sink.flush().await.ok();
                    }
                }
                Err(e) => {
                    debug!(error = %e, "child stderr read ended");
                    child_stderr = None;
                }
            },
            status = child.wait() => {
                debug!(?status, "child exited");
                drain_after_exit(&mut child_stdout, &mut output, &mut out_buf).await;
                if let Some(mut stderr) = child_stderr.take() {
                    drain_after_exit(&mut stderr, &mut err_sink, &mut err_buf).await;
                }
                break;
            }
        }
    }
    Ok(())
}
