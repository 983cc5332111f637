// Domain Error Types

use thiserror::Error;

/// Invalid queue configuration, raised before the queue is ever used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Queue id must be exactly one non-zero byte, got {len} in {id:?}")]
    InvalidQueueId { id: String, len: usize },

    #[error("Invalid permissions {0:#o}: only the 0o777 bits may be set")]
    InvalidPermissions(u32),

    #[error("Queue {queue} does not match the configuration its backend was built for ({backend})")]
    BackendMismatch { queue: String, backend: String },

    #[error("Polling requires a non-blocking queue, but {label} is blocking")]
    BlockingPoll { label: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
