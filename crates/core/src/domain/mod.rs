// Domain Layer - Messages, queue configuration and the capability matrix

pub mod capability;
pub mod error;
pub mod message;
pub mod queue;

// Re-exports
pub use capability::{Capabilities, Operation, UnsupportedOperation, UnsupportedReason};
pub use error::ConfigError;
pub use message::{Message, MessageBody, MessageId, MessageStatus, SenderId, SubscriberId};
pub use queue::{Limit, QueueConfig, QueueId, Subscription, DEFAULT_PERMISSIONS};
