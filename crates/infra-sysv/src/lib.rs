// ipcq Infrastructure - System V message queue adapter
// Implements: QueueBackend (ADR-002)

#[cfg(unix)]
pub mod backend;
#[cfg(unix)]
pub mod channel;
pub mod codec;

#[cfg(unix)]
pub use backend::SysVQueueBackend;
#[cfg(unix)]
pub use channel::{ChannelStats, QueueChannel, DEFAULT_KEY_ANCHOR, MSG_MAX_SIZE};
