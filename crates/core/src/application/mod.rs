// Application Layer - Queue orchestration and consumers

pub mod consumer;
pub mod queue;

// Re-exports
pub use consumer::{receive_within, shutdown_channel, Consumer, MessageHandler, ShutdownSender, ShutdownToken};
pub use queue::{Queue, SendContext, SendOutcome};
