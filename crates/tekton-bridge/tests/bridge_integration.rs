#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! Integration tests for the bridge launcher.
//!
//! Tests the full flow with real child processes (`cat`, `sh`, `sleep`)
//! and real sockets, without touching the test process's own stdio: the
//! stdio relay is driven through in-memory duplex streams.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

use tekton_bridge::relay::run_stdio_relay;
use tekton_bridge::{exit_code, BridgedChild, BridgeError, LaunchConfig, RetryPolicy};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        interval: Duration::from_millis(25),
        max_attempts: 5,
    }
}

#[allow(unsafe_code)] // kill(pid, 0) checks liveness without delivering anything
fn process_alive(pid: i32) -> bool {
    (unsafe { libc::kill(pid, 0) }) == 0
}

#[allow(unsafe_code)]
fn send_signal(pid: i32, signo: i32) {
    unsafe {
        libc::kill(pid, signo);
    }
}

/// Wait for a `sh -c 'echo $$ > file'` child to publish its pid.
async fn wait_for_pidfile(path: &std::path::Path) -> i32 {
    let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
    loop {
        if let Some(pid) = std::fs::read_to_string(path)
            .ok()
            .and_then(|text| text.trim().parse::<i32>().ok())
        {
            return pid;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "child never wrote its pid"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =========================================================================
// Socket-bridge mode
// =========================================================================

#[tokio::test]
async fn socket_bridge_relays_bytes_both_ways() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    // `cat` echoes everything the peer sends back over the bridge.
    let config = LaunchConfig::new("cat").with_tool_name("echo-tool").with_port(port);
    let bridge = tokio::spawn(tekton_bridge::run(config, RetryPolicy::default()));

    let (mut peer, _) = timeout(TEST_TIMEOUT, listener.accept()).await.unwrap().unwrap();
    peer.write_all(b"ping through the bridge\n").await.unwrap();

    let mut echoed = [0u8; 24];
    timeout(TEST_TIMEOUT, peer.read_exact(&mut echoed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&echoed, b"ping through the bridge\n");

    // Closing the peer connection ends the relay and tears the child down.
    drop(peer);
    let code = timeout(TEST_TIMEOUT, bridge).await.unwrap().unwrap().unwrap();
    // The child is torn down after the relay ends; it either saw EOF and
    // exited cleanly or was terminated by the shutdown signal.
    assert!(code == 0 || code == 128 + libc::SIGTERM);
}

#[tokio::test]
async fn socket_bridge_ends_when_child_exits() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = LaunchConfig::new("sh")
        .with_args(vec!["-c".to_string(), "exit 7".to_string()])
        .with_port(port);
    let bridge = tokio::spawn(tekton_bridge::run(config, RetryPolicy::default()));

    // The peer holds the connection open and sends nothing; only the child
    // exit can end the relay.
    let (_peer, _) = timeout(TEST_TIMEOUT, listener.accept()).await.unwrap().unwrap();

    // Child exit terminates the relay; the launcher reports the child's code.
    let code = timeout(TEST_TIMEOUT, bridge).await.unwrap().unwrap().unwrap();
    assert_eq!(code, 7);
}

#[tokio::test]
async fn connect_timeout_is_a_startup_error() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let pidfile = dir.path().join("child.pid");

    let config = LaunchConfig::new("sh")
        .with_args(vec![
            "-c".to_string(),
            format!("echo $$ > {}; exec sleep 30", pidfile.display()),
        ])
        .with_port(port);
    let err = timeout(TEST_TIMEOUT, tekton_bridge::run(config, fast_retry()))
        .await
        .unwrap()
        .err()
        .unwrap();
    assert!(matches!(err, BridgeError::ConnectTimeout { attempts: 5, .. }));

    // The failed startup still tears down and reaps the spawned child.
    let child_pid = std::fs::read_to_string(&pidfile)
        .unwrap()
        .trim()
        .parse::<i32>()
        .unwrap();
    assert!(!process_alive(child_pid));
}

#[tokio::test]
async fn socket_bridge_delivers_fast_exit_output() {
    // A child that writes and exits in the same instant: the exit can win
    // the select race, but the final bytes must still reach the peer.
    for _ in 0..20 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = LaunchConfig::new("sh")
            .with_args(vec!["-c".to_string(), "printf hello".to_string()])
            .with_port(port);
        let bridge = tokio::spawn(tekton_bridge::run(config, RetryPolicy::default()));

        let (mut peer, _) = timeout(TEST_TIMEOUT, listener.accept()).await.unwrap().unwrap();
        let mut out = [0u8; 5];
        timeout(TEST_TIMEOUT, peer.read_exact(&mut out))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&out, b"hello");

        let code = timeout(TEST_TIMEOUT, bridge).await.unwrap().unwrap().unwrap();
        assert_eq!(code, 0);
    }
}

// =========================================================================
// Stdio-relay mode (driven through in-memory streams)
// =========================================================================

#[tokio::test]
async fn stdio_relay_preserves_bytes_and_order() {
    let config = LaunchConfig::new("cat");
    let mut child = BridgedChild::spawn(&config).unwrap();

    let (mut input_wr, input_rd) = tokio::io::duplex(256);
    let (output_wr, mut output_rd) = tokio::io::duplex(256);
    let (err_wr, _err_rd) = tokio::io::duplex(256);

    let relay = tokio::spawn(async move {
        run_stdio_relay(&mut child, input_rd, output_wr, err_wr)
            .await
            .unwrap();
        child
    });

    input_wr.write_all(b"first line\n").await.unwrap();
    input_wr.write_all(b"second line\n").await.unwrap();

    let mut echoed = [0u8; 23];
    timeout(TEST_TIMEOUT, output_rd.read_exact(&mut echoed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&echoed, b"first line\nsecond line\n");

    // Input EOF closes the child's stdin but does not end the relay by
    // itself; `cat` sees EOF, exits, and the exit-wait branch ends the loop.
    drop(input_wr);
    let child = timeout(TEST_TIMEOUT, relay).await.unwrap().unwrap();
    let status = child.terminate(Duration::from_secs(2)).await.unwrap();
    assert_eq!(exit_code(status), 0);
}

#[tokio::test]
async fn stdio_relay_splits_stdout_and_stderr() {
    // The trailing `cat` keeps the child alive until input EOF, so both
    // printed streams are relayed before the exit branch ends the loop.
    let config = LaunchConfig::new("sh").with_args(vec![
        "-c".to_string(),
        "printf out; printf err 1>&2; cat >/dev/null".to_string(),
    ]);
    let mut child = BridgedChild::spawn(&config).unwrap();

    let (input_wr, input_rd) = tokio::io::duplex(256);
    let (output_wr, mut output_rd) = tokio::io::duplex(256);
    let (err_wr, mut err_rd) = tokio::io::duplex(256);

    let relay = tokio::spawn(async move {
        run_stdio_relay(&mut child, input_rd, output_wr, err_wr)
            .await
            .unwrap();
        child
    });

    let mut out = [0u8; 3];
    timeout(TEST_TIMEOUT, output_rd.read_exact(&mut out))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&out, b"out");

    let mut err = [0u8; 3];
    timeout(TEST_TIMEOUT, err_rd.read_exact(&mut err))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&err, b"err");

    drop(input_wr);
    let child = timeout(TEST_TIMEOUT, relay).await.unwrap().unwrap();
    let status = child.terminate(Duration::from_secs(2)).await.unwrap();
    assert_eq!(exit_code(status), 0);
}

#[tokio::test]
async fn stdio_relay_delivers_fast_exit_output() {
    // Repeated because the loss was a race: the exit-wait branch winning
    // over a stdout read that already had the child's last bytes pending.
    for _ in 0..50 {
        let config = LaunchConfig::new("sh")
            .with_args(vec!["-c".to_string(), "printf hello".to_string()]);
        let mut child = BridgedChild::spawn(&config).unwrap();

        let (_input_wr, input_rd) = tokio::io::duplex(64);
        let (output_wr, mut output_rd) = tokio::io::duplex(64);
        let (err_wr, _err_rd) = tokio::io::duplex(64);

        timeout(
            TEST_TIMEOUT,
            run_stdio_relay(&mut child, input_rd, output_wr, err_wr),
        )
        .await
        .unwrap()
        .unwrap();

        // The relay dropped its write end; what it relayed is all there is.
        let mut out = Vec::new();
        timeout(TEST_TIMEOUT, output_rd.read_to_end(&mut out))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out, b"hello");
    }
}

#[tokio::test]
async fn child_exit_terminates_idle_relay() {
    // The child produces nothing and exits; the relay must notice the exit
    // even though every stream is still open and idle.
    let config = LaunchConfig::new("true");
    let mut child = BridgedChild::spawn(&config).unwrap();

    let (_input_wr, input_rd) = tokio::io::duplex(64);
    let (output_wr, _output_rd) = tokio::io::duplex(64);
    let (err_wr, _err_rd) = tokio::io::duplex(64);

    timeout(
        TEST_TIMEOUT,
        run_stdio_relay(&mut child, input_rd, output_wr, err_wr),
    )
    .await
    .unwrap()
    .unwrap();
}

// =========================================================================
// Signal teardown (exercises the built launcher binary)
// =========================================================================

#[tokio::test]
async fn sigterm_tears_down_child_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let pidfile = dir.path().join("child.pid");

    // Stdin is /dev/null, so the relay sees input EOF immediately and then
    // idles on the long-running child; only the signal can end it.
    let mut bridge = tokio::process::Command::new(env!("CARGO_BIN_EXE_tekton-bridge"))
        .arg("--executable")
        .arg("sh")
        .arg("--args")
        .arg("-c")
        .arg(format!("echo $$ > {}; exec sleep 30", pidfile.display()))
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let child_pid = wait_for_pidfile(&pidfile).await;
    assert!(process_alive(child_pid));

    #[allow(clippy::cast_possible_wrap)]
    let bridge_pid = bridge.id().unwrap() as i32;
    send_signal(bridge_pid, libc::SIGTERM);

    // The launcher owns the teardown: it exits 0 and the child is gone.
    let status = timeout(TEST_TIMEOUT, bridge.wait()).await.unwrap().unwrap();
    assert_eq!(status.code(), Some(0));
    assert!(!process_alive(child_pid));
}
