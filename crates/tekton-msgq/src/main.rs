//! Command-line test harness for the message-queue relay.
//!
//! Exercises either backend against named queues: `create`, `destroy`,
//! `send`, and a single non-blocking `recv`. Received records are printed
//! as JSON to stdout; diagnostics go to stderr.

use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;

use tekton_msgq::{MessageQueue, MsgqError, PosixQueue, QueueMessage, UnixQueue};

#[derive(Parser, Debug)]
#[command(name = "tekton-msgq")]
#[command(version, about = "Tekton message-queue test harness")]
struct Cli {
    /// Queue backend to exercise
    #[arg(long, value_enum, default_value_t = Backend::Posix)]
    backend: Backend,

    /// Log level filter (e.g. "info", "debug", "warn")
    #[arg(long, default_value = "warn", env = "TEKTON_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation)
    #[arg(long, env = "TEKTON_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// POSIX message queue (mq_* syscalls)
    Posix,
    /// Unix-domain datagram socket
    Unix,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the named queue
    Create { name: String },

    /// Destroy the named queue
    Destroy { name: String },

    /// Send one message to an existing queue
    Send {
        name: String,
        /// Name of the sending component
        #[arg(long)]
        sender: String,
        /// Application-level type tag
        #[arg(long = "type")]
        type_tag: String,
        /// Priority 0-31
        #[arg(long, default_value_t = 0)]
        priority: u8,
        /// Payload text
        payload: String,
    },

    /// Receive one message if any is queued (non-blocking)
    Recv { name: String },
}

fn run_command<Q: MessageQueue>(command: Command) -> Result<(), MsgqError> {
    match command {
        Command::Create { name } => {
            Q::create(&name)?;
            println!("created queue {name}");
        }
        Command::Destroy { name } => {
            Q::unlink(&name)?;
            println!("destroyed queue {name}");
        }
        Command::Send {
            name,
            sender,
            type_tag,
            priority,
            payload,
        } => {
            let queue = Q::open(&name)?;
            let message = QueueMessage::new(sender, type_tag, priority, payload.into_bytes())?;
            queue.send(&message)?;
        }
        Command::Recv { name } => {
            let queue = Q::open(&name)?;
            match queue.try_receive()? {
                Some(message) => {
                    let json = serde_json::json!({
                        "sender": message.sender,
                        "type": message.type_tag,
                        "priority": message.priority,
                        "timestamp": message.timestamp,
                        "payload": String::from_utf8_lossy(&message.payload),
                    });
                    println!("{json}");
                }
                // An empty queue is a normal result, not an error.
                None => eprintln!("no message"),
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("tekton_msgq={}", cli.log_level);
    tekton_core::tracing_init::init_tracing(&log_filter, cli.log_json);

    let result = match cli.backend {
        Backend::Posix => run_command::<PosixQueue>(cli.command),
        Backend::Unix => run_command::<UnixQueue>(cli.command),
    };

    if let Err(e) = &result {
        error!(error = %e, "Queue operation failed");
    }
    result.map_err(Into::into)
}
