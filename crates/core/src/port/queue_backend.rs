// Queue Backend Port (Interface)
// One implementation per transport; the capability matrix says which
// operations a transport can actually perform.

use thiserror::Error;

use crate::domain::{
    Capabilities, Limit, Message, MessageId, MessageStatus, Operation, QueueConfig, Subscription,
    SubscriberId, UnsupportedOperation,
};
use crate::error::Result;

/// What a send does when the channel has no room left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendPolicy {
    /// Fail right away with `TransportError::Full`
    #[default]
    NoWait,
    /// Suspend the calling thread until there is room
    Wait,
}

/// Transmission failures, reported to callers as a failed send
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Channel is full")]
    Full,

    #[error("Encoded message is {size} bytes, the limit is {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Channel unavailable: {0}")]
    Channel(String),

    /// Raised by operations that inspect or destroy a channel but never create one
    #[error("No channel exists for {0}")]
    NotFound(String),

    #[error("{operation} failed: {source}")]
    Os {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    pub fn is_full(&self) -> bool {
        matches!(self, TransportError::Full)
    }
}

/// Queue backend trait
///
/// Implementations:
/// - SysVQueueBackend (ipcq-infra-sysv): System V message queues, send/receive only
/// - MemoryBackend (mocks): bounded in-process queue for tests
///
/// Every operation besides `send` and `receive` defaults to an
/// `UnsupportedReason::NotImplemented` error. Backends whose transport can
/// never offer an operation override it with `UnsupportedOperation::transport`.
pub trait QueueBackend: Send + Sync {
    /// Short backend name used in errors and logs
    fn name(&self) -> &'static str;

    /// Operations this backend implements
    fn capabilities(&self) -> Capabilities;

    /// Configuration the backend was built from, if it is bound to one
    ///
    /// `Queue::new` refuses a configuration that differs from it.
    fn bound_config(&self) -> Option<&QueueConfig> {
        None
    }

    /// Transmit one message
    ///
    /// Either the whole message is enqueued or nothing is.
    fn send(
        &self,
        message: &Message,
        category: Option<&str>,
        policy: SendPolicy,
    ) -> std::result::Result<(), TransportError>;

    /// Remove and return up to `limit` pending messages
    ///
    /// With `blocking` each removal waits for a message; otherwise an empty
    /// channel ends the call. Channel failures end the drain instead of
    /// failing the call.
    ///
    /// # Errors
    /// - AppError::Unsupported if a subscriber is given to a backend without subscriptions
    fn receive(
        &self,
        subscriber_id: Option<&SubscriberId>,
        limit: Limit,
        blocking: bool,
    ) -> Result<Vec<Message>>;

    /// Read messages without removing them
    fn peek(
        &self,
        _subscriber_id: Option<&SubscriberId>,
        _limit: Limit,
        _status: MessageStatus,
    ) -> Result<Vec<Message>> {
        Err(UnsupportedOperation::not_implemented(self.name(), Operation::Peek).into())
    }

    /// Mark messages reserved until deleted or released
    fn reserve(&self, _subscriber_id: Option<&SubscriberId>, _limit: Limit) -> Result<Vec<Message>> {
        Err(UnsupportedOperation::not_implemented(self.name(), Operation::Reserve).into())
    }

    /// Delete a reserved message, returning the deleted ids
    fn delete(
        &self,
        _message_id: &MessageId,
        _subscriber_id: Option<&SubscriberId>,
    ) -> Result<Vec<MessageId>> {
        Err(UnsupportedOperation::not_implemented(self.name(), Operation::Delete).into())
    }

    /// Make a reserved message available again, returning the released ids
    fn release(
        &self,
        _message_id: &MessageId,
        _subscriber_id: Option<&SubscriberId>,
    ) -> Result<Vec<MessageId>> {
        Err(UnsupportedOperation::not_implemented(self.name(), Operation::Release).into())
    }

    /// Release every reservation whose timeout expired
    fn release_timed_out(&self) -> Result<Vec<MessageId>> {
        Err(UnsupportedOperation::not_implemented(self.name(), Operation::ReleaseTimedOut).into())
    }

    fn subscribe(&self, _subscription: &Subscription) -> Result<()> {
        Err(UnsupportedOperation::not_implemented(self.name(), Operation::Subscribe).into())
    }

    fn unsubscribe(&self, _subscriber_id: &SubscriberId, _categories: Option<&[String]>) -> Result<()> {
        Err(UnsupportedOperation::not_implemented(self.name(), Operation::Unsubscribe).into())
    }

    fn is_subscribed(&self, _subscriber_id: &SubscriberId) -> Result<bool> {
        Err(UnsupportedOperation::not_implemented(self.name(), Operation::IsSubscribed).into())
    }

    fn subscriptions(&self, _subscriber_id: Option<&SubscriberId>) -> Result<Vec<Subscription>> {
        Err(UnsupportedOperation::not_implemented(self.name(), Operation::GetSubscriptions).into())
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Bounded in-process backend
    ///
    /// Never suspends: a full queue fails regardless of the send policy, and
    /// a blocking receive behaves like a non-blocking one.
    pub struct MemoryBackend {
        capacity: usize,
        messages: Mutex<VecDeque<Message>>,
        closed: AtomicBool,
        bound: Option<QueueConfig>,
    }

    impl MemoryBackend {
        pub fn new(capacity: usize) -> Self {
            Self {
                capacity,
                messages: Mutex::new(VecDeque::new()),
                closed: AtomicBool::new(false),
                bound: None,
            }
        }

        pub fn bound_to(mut self, config: QueueConfig) -> Self {
            self.bound = Some(config);
            self
        }

        /// Make every following send fail with a channel error
        pub fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        pub fn pending(&self) -> usize {
            self.messages.lock().unwrap().len()
        }
    }

    impl QueueBackend for MemoryBackend {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::of(&[Operation::Send, Operation::Receive])
        }

        fn bound_config(&self) -> Option<&QueueConfig> {
            self.bound.as_ref()
        }

        fn send(
            &self,
            message: &Message,
            _category: Option<&str>,
            _policy: SendPolicy,
        ) -> std::result::Result<(), TransportError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Channel("memory backend closed".to_string()));
            }
            let mut messages = self.messages.lock().unwrap();
            if messages.len() >= self.capacity {
                return Err(TransportError::Full);
            }
            messages.push_back(message.clone());
            Ok(())
        }

        fn receive(
            &self,
            subscriber_id: Option<&SubscriberId>,
            limit: Limit,
            _blocking: bool,
        ) -> Result<Vec<Message>> {
            if subscriber_id.is_some() {
                return Err(
                    UnsupportedOperation::not_implemented(self.name(), Operation::Receive).into(),
                );
            }
            let mut messages = self.messages.lock().unwrap();
            let mut drained = Vec::new();
            while !limit.is_reached(drained.len()) {
                match messages.pop_front() {
                    Some(mut message) => {
                        message.mark_delivered(None);
                        drained.push(message);
                    }
                    None => break,
                }
            }
            Ok(drained)
        }
    }
}
