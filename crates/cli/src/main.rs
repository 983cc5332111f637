//! ipcq CLI - send to and drain System V message queues

mod logging;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::info;

use ipcq_core::application::consumer::constants::DEFAULT_BATCH_SIZE;
use ipcq_core::application::{shutdown_channel, Consumer, MessageHandler};
use ipcq_core::domain::{Limit, Message, Operation, QueueConfig};
use ipcq_core::port::{SendPolicy, TransportError};
use ipcq_core::{AppError, Queue, SendContext, SendOutcome};
use ipcq_infra_sysv::{SysVQueueBackend, DEFAULT_KEY_ANCHOR};

#[derive(Parser)]
#[command(name = "ipcq")]
#[command(about = "Send to and receive from System V message queues", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Queue id (exactly one non-NUL character)
    #[arg(short, long, env = "IPCQ_QUEUE_ID", default_value = "q")]
    id: String,

    /// Label used in log messages (default: "queue <id>")
    #[arg(long, env = "IPCQ_QUEUE_LABEL")]
    label: Option<String>,

    /// Wait for messages on receive instead of returning what is pending
    #[arg(long, env = "IPCQ_BLOCKING")]
    blocking: bool,

    /// Octal mode bits applied when the queue is created
    #[arg(long, env = "IPCQ_PERMISSIONS", default_value = "666", value_parser = parse_octal)]
    permissions: u32,

    /// Existing file whose inode, with the id, selects the queue
    #[arg(long, env = "IPCQ_KEY_ANCHOR", default_value = DEFAULT_KEY_ANCHOR)]
    anchor: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message
    Send {
        /// Message body
        body: String,

        /// Parse the body as JSON instead of sending it as a string
        #[arg(long)]
        json: bool,

        /// Sender identity stored on the message
        #[arg(long)]
        sender: Option<String>,

        /// Category (accepted for compatibility, unused by System V queues)
        #[arg(long)]
        category: Option<String>,

        /// Wait for room instead of failing when the queue is full
        #[arg(long)]
        wait: bool,
    },

    /// Receive pending messages as JSON lines
    Receive {
        /// Maximum number of messages, -1 for all
        #[arg(short = 'n', long, default_value_t = -1, allow_negative_numbers = true)]
        limit: i64,
    },

    /// Print messages as they arrive until Ctrl-C
    Consume {
        /// Messages drained per poll
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch: usize,
    },

    /// Show which queue operations this backend supports
    Capabilities,

    /// Show kernel statistics for an existing queue
    Stat,

    /// Destroy the queue and everything pending in it
    Remove,
}

#[derive(Tabled)]
struct CapabilityRow {
    operation: String,
    supported: String,
}

fn parse_octal(value: &str) -> std::result::Result<u32, String> {
    let digits = value.trim_start_matches("0o");
    u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode {value:?}: {e}"))
}

fn open_queue(cli: &Cli) -> Result<(Arc<Queue>, Arc<SysVQueueBackend>)> {
    let label = cli
        .label
        .clone()
        .unwrap_or_else(|| format!("queue {}", cli.id));
    let config = QueueConfig::new(&cli.id, label)?
        .with_blocking(cli.blocking)
        .with_permissions(cli.permissions)?;

    let anchor = shellexpand::tilde(&cli.anchor).into_owned();
    let backend = Arc::new(SysVQueueBackend::with_anchor(&config, &anchor)?);
    let queue = Arc::new(Queue::new(config, backend.clone())?);
    Ok((queue, backend))
}

/// Writes every consumed message to stdout
struct PrintHandler;

#[async_trait]
impl MessageHandler for PrintHandler {
    async fn handle(&self, message: Message) -> ipcq_core::Result<()> {
        println!("{}", serde_json::to_string(&message)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging()?;
    let cli = Cli::parse();
    let (queue, backend) = open_queue(&cli)?;

    match cli.command {
        Commands::Send {
            body,
            json,
            sender,
            category,
            wait,
        } => {
            let body = if json {
                serde_json::from_str(&body).context("Invalid JSON body")?
            } else {
                serde_json::Value::String(body)
            };

            let mut ctx = SendContext::default();
            ctx.sender_id = sender;
            ctx.category = category;
            if wait {
                ctx.policy = SendPolicy::Wait;
            }

            match queue.send(body, &ctx) {
                SendOutcome::Sent => println!("{}", "✓ Message sent".green().bold()),
                SendOutcome::Vetoed => println!("{}", "○ Message skipped".yellow()),
                SendOutcome::Failed(e) => {
                    anyhow::bail!("Failed to send to {}: {}", queue.label(), e);
                }
            }
        }

        Commands::Receive { limit } => {
            for message in queue.receive(None, Limit::from_raw(limit))? {
                println!("{}", serde_json::to_string(&message)?);
            }
        }

        Commands::Consume { batch } => {
            let (shutdown_tx, shutdown_rx) = shutdown_channel();
            let consumer = Consumer::new(queue.clone(), Arc::new(PrintHandler))?
                .with_batch(Limit::AtMost(batch));

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    shutdown_tx.shutdown();
                }
            });

            let handled = consumer.run(shutdown_rx).await?;
            info!(handled, "Consumer finished");
        }

        Commands::Capabilities => {
            let capabilities = queue.capabilities();
            let rows: Vec<CapabilityRow> = Operation::ALL
                .iter()
                .map(|op| CapabilityRow {
                    operation: op.to_string(),
                    supported: if capabilities.supports(*op) {
                        "yes".green().to_string()
                    } else {
                        "no".red().to_string()
                    },
                })
                .collect();

            println!(
                "{}",
                format!("Backend: {}", queue.backend_name()).cyan().bold()
            );
            println!("{}", Table::new(rows));
        }

        Commands::Stat => {
            let channel = backend.channel();
            let stats = match backend.stat() {
                Err(AppError::Transport(TransportError::NotFound(_))) => {
                    anyhow::bail!("{} does not exist yet; sending to it creates it", queue.label());
                }
                other => other?,
            };
            let key = channel.key()?;

            println!("{}", format!("Queue {}", queue.label()).cyan().bold());
            println!();
            println!("  {} {}", "Id:".bold(), channel.id());
            println!("  {} {}", "Anchor:".bold(), channel.anchor().display());
            println!("  {} {:#x}", "Key:".bold(), key);
            println!("  {} {}", "Pending:".bold(), stats.pending_messages);
            println!("  {} {} bytes", "Capacity:".bold(), stats.max_bytes);
            println!("  {} {} bytes", "Max message:".bold(), backend.max_message_size());
            println!("  {} {}", "Last sender pid:".bold(), stats.last_send_pid);
            println!("  {} {}", "Last receiver pid:".bold(), stats.last_receive_pid);
        }

        Commands::Remove => {
            backend.remove()?;
            println!(
                "{}",
                format!("✓ Removed {}", queue.label()).green().bold()
            );
        }
    }

    Ok(())
}
