// Consumer - polling loop over a non-blocking queue

pub mod constants;

use constants::*;

use crate::application::Queue;
use crate::domain::{ConfigError, Limit, Message};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

/// Stop signal observed by a running consumer
#[derive(Clone)]
pub struct ShutdownToken(watch::Receiver<bool>);

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once a stop was requested, or when no sender is left
    pub async fn wait(&mut self) {
        let _ = self.0.wait_for(|stop| *stop).await;
    }
}

/// Owner side of the stop signal
pub struct ShutdownSender(watch::Sender<bool>);

impl ShutdownSender {
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender(tx), ShutdownToken(rx))
}

/// Receives every message the consumer drains
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one message
    ///
    /// The message is already gone from the channel; an error is logged and
    /// the consumer moves on.
    async fn handle(&self, message: Message) -> Result<()>;
}

fn ensure_non_blocking(queue: &Queue) -> Result<()> {
    if queue.config().blocking() {
        return Err(ConfigError::BlockingPoll {
            label: queue.label().to_string(),
        }
        .into());
    }
    Ok(())
}

/// Drains a queue in batches until shut down
///
/// Only non-blocking queues are accepted: a blocking receive could not be
/// interrupted by the shutdown signal.
pub struct Consumer {
    queue: Arc<Queue>,
    handler: Arc<dyn MessageHandler>,
    batch: Limit,
    idle_sleep: Duration,
}

impl Consumer {
    /// # Errors
    /// - AppError::Config if the queue is configured as blocking
    pub fn new(queue: Arc<Queue>, handler: Arc<dyn MessageHandler>) -> Result<Self> {
        ensure_non_blocking(&queue)?;
        Ok(Self {
            queue,
            handler,
            batch: Limit::AtMost(DEFAULT_BATCH_SIZE),
            idle_sleep: IDLE_SLEEP_DURATION,
        })
    }

    pub fn with_batch(mut self, batch: Limit) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    /// Run until shutdown, returning how many messages were handled
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<u64> {
        info!(queue_label = %self.queue.label(), "Consumer started");
        let mut handled: u64 = 0;
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            match self.poll_once().await {
                Ok(0) => {
                    tokio::select! {
                        _ = sleep(self.idle_sleep) => {},
                        _ = shutdown.wait() => break,
                    }
                }
                Ok(count) => handled += count as u64,
                Err(e) => {
                    error!(queue_label = %self.queue.label(), error = %e, "Consumer receive failed");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => break,
                    }
                }
            }
        }
        info!(queue_label = %self.queue.label(), handled, "Consumer stopped");
        Ok(handled)
    }

    /// Drain one batch and hand it to the handler
    pub async fn poll_once(&self) -> Result<usize> {
        let messages = self.queue.receive(None, self.batch)?;
        let count = messages.len();
        for message in messages {
            if let Err(e) = self.handler.handle(message).await {
                warn!(queue_label = %self.queue.label(), error = %e, "Message handler failed");
            }
        }
        Ok(count)
    }
}

/// Receive with a timeout by polling a non-blocking queue
///
/// Returns as soon as at least one message is available, or an empty batch
/// once `timeout` elapsed.
///
/// # Errors
/// - AppError::Config if the queue is configured as blocking
pub async fn receive_within(queue: &Queue, limit: Limit, timeout: Duration) -> Result<Vec<Message>> {
    ensure_non_blocking(queue)?;
    let deadline = Instant::now() + timeout;
    loop {
        let messages = queue.receive(None, limit)?;
        let now = Instant::now();
        if !messages.is_empty() || now >= deadline {
            return Ok(messages);
        }
        sleep(IDLE_SLEEP_DURATION.min(deadline - now)).await;
    }
}
