// System V queue backend (ADR-002)
// Implements only send and receive; the transport cannot support the rest.

use std::path::Path;
use tracing::{error, warn};

use ipcq_core::domain::{
    Capabilities, Limit, Message, MessageId, MessageStatus, Operation, QueueConfig, SubscriberId,
    Subscription, UnsupportedOperation,
};
use ipcq_core::port::{QueueBackend, SendPolicy, TransportError};
use ipcq_core::{Result, LOG_TARGET};

use crate::channel::{ChannelStats, QueueChannel, DEFAULT_KEY_ANCHOR, MSG_MAX_SIZE};
use crate::codec;

const BACKEND_NAME: &str = "sysv";

const SUPPORTED: Capabilities = Capabilities::of(&[Operation::Send, Operation::Receive]);

const NO_PEEK: &str =
    "System V queues cannot read a message without removing it; use receive instead";
const NO_RESERVATION: &str = "System V queues cannot leave a message pending without removing it \
     from the channel, so reservation and acknowledgement are impossible; use receive instead";
const NO_SUBSCRIPTIONS: &str = "System V queues have no concept of subscribers";

fn unsupported(operation: Operation, why: &'static str) -> ipcq_core::AppError {
    UnsupportedOperation::transport(BACKEND_NAME, operation, why).into()
}

/// Queue backend over a System V message queue
///
/// Messages are JSON-encoded and capped at `MSG_MAX_SIZE` bytes. A received
/// message is gone from the kernel queue, so every delivered message is
/// `Available` and has no subscriber.
pub struct SysVQueueBackend {
    channel: QueueChannel,
    config: QueueConfig,
}

impl SysVQueueBackend {
    /// Create a backend keyed on `DEFAULT_KEY_ANCHOR`
    ///
    /// # Errors
    /// - AppError::Config if the configuration is invalid
    pub fn new(config: &QueueConfig) -> Result<Self> {
        Self::with_anchor(config, DEFAULT_KEY_ANCHOR)
    }

    /// Create a backend keyed on an explicit anchor file
    ///
    /// Producers and consumers must agree on the anchor to share a channel.
    /// The channel itself is opened lazily on first send or receive. A
    /// `Queue` over this backend must be built from the same configuration.
    pub fn with_anchor(config: &QueueConfig, anchor: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;
        let channel = QueueChannel::new(anchor, config.id(), config.permissions())?;
        Ok(Self {
            channel,
            config: config.clone(),
        })
    }

    pub fn channel(&self) -> &QueueChannel {
        &self.channel
    }

    pub fn max_message_size(&self) -> usize {
        MSG_MAX_SIZE
    }

    /// Kernel state of the queue; fails if it was never created
    pub fn stat(&self) -> Result<ChannelStats> {
        Ok(self.channel.stat()?)
    }

    /// Destroy the kernel queue and everything pending in it
    pub fn remove(&self) -> Result<()> {
        Ok(self.channel.remove()?)
    }
}

impl QueueBackend for SysVQueueBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn capabilities(&self) -> Capabilities {
        SUPPORTED
    }

    fn bound_config(&self) -> Option<&QueueConfig> {
        Some(&self.config)
    }

    fn send(
        &self,
        message: &Message,
        _category: Option<&str>,
        policy: SendPolicy,
    ) -> std::result::Result<(), TransportError> {
        let payload = codec::encode(message)?;
        self.channel
            .send_bytes(&payload, policy == SendPolicy::Wait)
    }

    fn receive(
        &self,
        subscriber_id: Option<&SubscriberId>,
        limit: Limit,
        blocking: bool,
    ) -> Result<Vec<Message>> {
        if subscriber_id.is_some() {
            return Err(unsupported(Operation::Receive, NO_SUBSCRIPTIONS));
        }

        let mut messages = Vec::new();
        while !limit.is_reached(messages.len()) {
            match self.channel.receive_bytes(blocking) {
                Ok(Some(payload)) => match codec::decode(&payload) {
                    Ok(mut message) => {
                        message.mark_delivered(None);
                        messages.push(message);
                    }
                    Err(e) => {
                        warn!(
                            target: LOG_TARGET,
                            queue_label = %self.config.label(),
                            error = %e,
                            bytes = payload.len(),
                            "Discarding undecodable message"
                        );
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    error!(
                        target: LOG_TARGET,
                        queue_label = %self.config.label(),
                        error = %e,
                        "Failed to receive from queue"
                    );
                    break;
                }
            }
        }
        Ok(messages)
    }

    fn peek(
        &self,
        _subscriber_id: Option<&SubscriberId>,
        _limit: Limit,
        _status: MessageStatus,
    ) -> Result<Vec<Message>> {
        Err(unsupported(Operation::Peek, NO_PEEK))
    }

    fn reserve(&self, _subscriber_id: Option<&SubscriberId>, _limit: Limit) -> Result<Vec<Message>> {
        Err(unsupported(Operation::Reserve, NO_RESERVATION))
    }

    fn delete(
        &self,
        _message_id: &MessageId,
        _subscriber_id: Option<&SubscriberId>,
    ) -> Result<Vec<MessageId>> {
        Err(unsupported(Operation::Delete, NO_RESERVATION))
    }

    fn release(
        &self,
        _message_id: &MessageId,
        _subscriber_id: Option<&SubscriberId>,
    ) -> Result<Vec<MessageId>> {
        Err(unsupported(Operation::Release, NO_RESERVATION))
    }

    fn release_timed_out(&self) -> Result<Vec<MessageId>> {
        Err(unsupported(Operation::ReleaseTimedOut, NO_RESERVATION))
    }

    fn subscribe(&self, _subscription: &Subscription) -> Result<()> {
        Err(unsupported(Operation::Subscribe, NO_SUBSCRIPTIONS))
    }

    fn unsubscribe(&self, _subscriber_id: &SubscriberId, _categories: Option<&[String]>) -> Result<()> {
        Err(unsupported(Operation::Unsubscribe, NO_SUBSCRIPTIONS))
    }

    fn is_subscribed(&self, _subscriber_id: &SubscriberId) -> Result<bool> {
        Err(unsupported(Operation::IsSubscribed, NO_SUBSCRIPTIONS))
    }

    fn subscriptions(&self, _subscriber_id: Option<&SubscriberId>) -> Result<Vec<Subscription>> {
        Err(unsupported(Operation::GetSubscriptions, NO_SUBSCRIPTIONS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipcq_core::domain::UnsupportedReason;

    fn backend() -> (SysVQueueBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = QueueConfig::new("u", "unsupported ops").unwrap();
        let backend = SysVQueueBackend::with_anchor(&config, dir.path()).unwrap();
        (backend, dir)
    }

    #[test]
    fn test_capabilities_are_send_and_receive() {
        let (backend, _dir) = backend();
        let supported: Vec<_> = backend.capabilities().supported().collect();
        assert_eq!(supported, vec![Operation::Send, Operation::Receive]);
    }

    #[test]
    fn test_unsupported_operations_explain_transport_limit() {
        let (backend, _dir) = backend();
        let id = "42".to_string();
        let sub = "subscriber".to_string();

        // Twice, to show the answer never changes
        for _ in 0..2 {
            let errors = vec![
                backend.peek(None, Limit::Unbounded, MessageStatus::Available).unwrap_err(),
                backend.reserve(None, Limit::AtMost(1)).unwrap_err(),
                backend.delete(&id, None).unwrap_err(),
                backend.release(&id, Some(&sub)).unwrap_err(),
                backend.release_timed_out().unwrap_err(),
                backend.subscribe(&Subscription::new("subscriber")).unwrap_err(),
                backend.unsubscribe(&sub, None).unwrap_err(),
                backend.is_subscribed(&sub).unwrap_err(),
                backend.subscriptions(Some(&sub)).unwrap_err(),
            ];
            for err in errors {
                let unsupported = err.as_unsupported().expect("unsupported operation");
                assert_eq!(unsupported.backend, "sysv");
                assert!(unsupported.is_transport_limit());
                assert!(!backend.capabilities().supports(unsupported.operation));
                assert!(matches!(unsupported.reason, UnsupportedReason::Transport(why) if !why.is_empty()));
            }
        }
    }

    #[test]
    fn test_receive_with_subscriber_fails_before_draining() {
        let (backend, _dir) = backend();
        let sub = "subscriber".to_string();

        let err = backend.receive(Some(&sub), Limit::Unbounded, false).unwrap_err();

        let unsupported = err.as_unsupported().unwrap();
        assert_eq!(unsupported.operation, Operation::Receive);
        assert!(unsupported.explanation().contains("subscribers"));
    }

    /// Backend on a private anchor whose queue is removed on drop
    struct Scratch {
        backend: SysVQueueBackend,
        _dir: tempfile::TempDir,
    }

    impl Scratch {
        fn new(id: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = QueueConfig::new(id, "drain loop").unwrap();
            // A crashed earlier run may have left a queue on a recycled inode
            let _ = SysVQueueBackend::with_anchor(&config, dir.path())
                .unwrap()
                .remove();
            let backend = SysVQueueBackend::with_anchor(&config, dir.path()).unwrap();
            Self { backend, _dir: dir }
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = self.backend.remove();
        }
    }

    fn message(body: &str) -> Message {
        Message::new(chrono::Utc::now(), None, body)
    }

    #[test]
    fn test_undecodable_payload_skipped_without_counting() {
        let scratch = Scratch::new("g");
        let backend = &scratch.backend;

        backend.channel().send_bytes(b"garbage", false).unwrap();
        backend.send(&message("ok"), None, SendPolicy::NoWait).unwrap();

        let received = backend.receive(None, Limit::AtMost(1), false).unwrap();

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body_str(), Some("ok"));
        assert_eq!(backend.stat().unwrap().pending_messages, 0);
    }

    #[test]
    fn test_channel_failure_ends_drain_without_error() {
        let scratch = Scratch::new("z");
        let backend = &scratch.backend;
        backend.send(&message("lost"), None, SendPolicy::NoWait).unwrap();

        backend.remove().unwrap();
        let received = backend.receive(None, Limit::Unbounded, false);

        assert!(matches!(received, Ok(ref messages) if messages.is_empty()));
    }

    #[test]
    fn test_bound_config_is_the_construction_config() {
        let (backend, _dir) = backend();
        let bound = backend.bound_config().unwrap();
        assert_eq!(bound.id().to_string(), "u");
        assert_eq!(bound.label(), "unsupported ops");
    }

    #[test]
    fn test_anchor_with_nul_rejected() {
        let config = QueueConfig::new("n", "nul").unwrap();
        let result = SysVQueueBackend::with_anchor(&config, "/tmp/bad\0anchor");
        assert!(matches!(
            result,
            Err(ipcq_core::AppError::Transport(TransportError::Channel(_)))
        ));
    }
}
