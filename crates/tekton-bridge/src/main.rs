//! Tekton process bridge launcher binary.
//!
//! Spawns the configured executable with piped stdio and relays bytes
//! between it and either this process's own standard streams (default) or
//! an outbound connection to `127.0.0.1:<port>` (when `--port` is given).

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use tekton_bridge::{LaunchConfig, RetryPolicy};

#[derive(Parser, Debug)]
#[command(name = "tekton-bridge")]
#[command(version, about = "Tekton process bridge launcher")]
struct Args {
    /// Path to the child executable
    #[arg(long)]
    executable: PathBuf,

    /// Identity string exported to the child as TEKTON_NAME
    #[arg(long)]
    tool: Option<String>,

    /// Target port; presence switches to socket-bridge mode
    #[arg(long)]
    port: Option<u16>,

    /// Remaining tokens passed verbatim as the child's argument vector
    #[arg(long, num_args = 0.., allow_hyphen_values = true)]
    args: Vec<String>,

    /// Log level filter (e.g. "info", "debug", "warn")
    #[arg(long, default_value = "info", env = "TEKTON_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation)
    #[arg(long, env = "TEKTON_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_filter = format!("tekton_bridge={}", args.log_level);
    tekton_core::tracing_init::init_tracing(&log_filter, args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        executable = %args.executable.display(),
        tool = ?args.tool,
        port = ?args.port,
        "Starting tekton-bridge"
    );

    let mut config = LaunchConfig::new(args.executable).with_args(args.args);
    if let Some(tool) = args.tool {
        config = config.with_tool_name(tool);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    let code = match tekton_bridge::run(config, RetryPolicy::default()).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Bridge launcher failed");
            eprintln!("tekton-bridge: {e}");
            1
        }
    };
    std::process::exit(code);
}
