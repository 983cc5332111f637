// Queue - the contract callers use, dispatching to one backend

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::domain::{
    Capabilities, ConfigError, Limit, Message, MessageBody, MessageId, MessageStatus, Operation,
    QueueConfig, SenderId, SubscriberId, Subscription,
};
use crate::error::{AppError, Result};
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{
    NoopInterceptor, QueueBackend, SendInterceptor, SendPolicy, TimeProvider, TransportError,
};
use crate::LOG_TARGET;

/// Per-call send options
///
/// The sender identity is passed here explicitly instead of being looked up
/// from ambient session state.
#[derive(Debug, Clone, Default)]
pub struct SendContext {
    pub sender_id: Option<SenderId>,
    pub category: Option<String>,
    pub policy: SendPolicy,
}

impl SendContext {
    pub fn with_sender(mut self, sender_id: impl Into<SenderId>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_policy(mut self, policy: SendPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Result of a send
#[derive(Debug)]
pub enum SendOutcome {
    /// The backend accepted the message
    Sent,
    /// `before_send` discarded the message; nothing was transmitted
    Vetoed,
    /// Transmission failed; nothing was transmitted
    Failed(TransportError),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }

    pub fn is_vetoed(&self) -> bool {
        matches!(self, SendOutcome::Vetoed)
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            SendOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// `Ok(true)` when sent, `Ok(false)` when vetoed, `Err` on transport failure
    pub fn into_result(self) -> Result<bool> {
        match self {
            SendOutcome::Sent => Ok(true),
            SendOutcome::Vetoed => Ok(false),
            SendOutcome::Failed(err) => Err(AppError::Transport(err)),
        }
    }
}

/// Message queue bound to a single backend
pub struct Queue {
    config: QueueConfig,
    backend: Arc<dyn QueueBackend>,
    interceptor: Arc<dyn SendInterceptor>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Queue {
    /// Create a queue with pass-through hooks and the system clock
    ///
    /// # Errors
    /// - AppError::Config if the configuration is invalid, or differs from
    ///   the one the backend was built with
    pub fn new(config: QueueConfig, backend: Arc<dyn QueueBackend>) -> Result<Self> {
        config.validate()?;
        if let Some(bound) = backend.bound_config() {
            if *bound != config {
                return Err(ConfigError::BackendMismatch {
                    queue: config.label().to_string(),
                    backend: bound.label().to_string(),
                }
                .into());
            }
        }
        Ok(Self {
            config,
            backend,
            interceptor: Arc::new(NoopInterceptor),
            time_provider: Arc::new(SystemTimeProvider),
        })
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn SendInterceptor>) -> Self {
        self.interceptor = interceptor;
        self
    }

    pub fn with_time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        self.config.label()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    /// Check support before calling an operation
    pub fn supports(&self, operation: Operation) -> bool {
        self.capabilities().supports(operation)
    }

    /// Build a message stamped with the current time, then apply `format_message`
    pub fn create_message(&self, body: impl Into<MessageBody>, sender_id: Option<SenderId>) -> Message {
        let message = Message::new(self.time_provider.now(), sender_id, body);
        self.interceptor.format_message(message)
    }

    /// Send a message
    ///
    /// Transport failures are logged and returned as `SendOutcome::Failed`
    /// rather than raised; the caller decides whether to retry.
    pub fn send(&self, body: impl Into<MessageBody>, ctx: &SendContext) -> SendOutcome {
        let message = self.create_message(body, ctx.sender_id.clone());

        if !self.interceptor.before_send(&message) {
            info!(
                target: LOG_TARGET,
                queue_label = %self.label(),
                body = %message.body,
                "Not sending message to queue"
            );
            return SendOutcome::Vetoed;
        }

        if let Err(err) = self
            .backend
            .send(&message, ctx.category.as_deref(), ctx.policy)
        {
            error!(
                target: LOG_TARGET,
                queue_label = %self.label(),
                body = %message.body,
                error = %err,
                "Failed to save message in queue"
            );
            if err.is_full() {
                error!(target: LOG_TARGET, queue_label = %self.label(), "Queue is full");
            }
            return SendOutcome::Failed(err);
        }

        self.interceptor.after_send(&message);

        info!(
            target: LOG_TARGET,
            queue_label = %self.label(),
            body = %message.body,
            "Sent message to queue"
        );
        SendOutcome::Sent
    }

    /// Remove and return pending messages
    ///
    /// Blocks per message when the queue is configured as blocking.
    ///
    /// # Errors
    /// - AppError::Unsupported if `subscriber_id` is given and the backend has no subscriptions
    pub fn receive(&self, subscriber_id: Option<&SubscriberId>, limit: Limit) -> Result<Vec<Message>> {
        let messages = self
            .backend
            .receive(subscriber_id, limit, self.config.blocking())?;
        debug!(
            queue_label = %self.label(),
            count = messages.len(),
            "Received messages from queue"
        );
        Ok(messages)
    }

    pub fn peek(
        &self,
        subscriber_id: Option<&SubscriberId>,
        limit: Limit,
        status: MessageStatus,
    ) -> Result<Vec<Message>> {
        self.backend.peek(subscriber_id, limit, status)
    }

    pub fn reserve(&self, subscriber_id: Option<&SubscriberId>, limit: Limit) -> Result<Vec<Message>> {
        self.backend.reserve(subscriber_id, limit)
    }

    pub fn delete(
        &self,
        message_id: &MessageId,
        subscriber_id: Option<&SubscriberId>,
    ) -> Result<Vec<MessageId>> {
        self.backend.delete(message_id, subscriber_id)
    }

    pub fn release(
        &self,
        message_id: &MessageId,
        subscriber_id: Option<&SubscriberId>,
    ) -> Result<Vec<MessageId>> {
        self.backend.release(message_id, subscriber_id)
    }

    pub fn release_timed_out(&self) -> Result<Vec<MessageId>> {
        self.backend.release_timed_out()
    }

    pub fn subscribe(&self, subscription: &Subscription) -> Result<()> {
        self.backend.subscribe(subscription)
    }

    pub fn unsubscribe(&self, subscriber_id: &SubscriberId, categories: Option<&[String]>) -> Result<()> {
        self.backend.unsubscribe(subscriber_id, categories)
    }

    pub fn is_subscribed(&self, subscriber_id: &SubscriberId) -> Result<bool> {
        self.backend.is_subscribed(subscriber_id)
    }

    pub fn subscriptions(&self, subscriber_id: Option<&SubscriberId>) -> Result<Vec<Subscription>> {
        self.backend.subscriptions(subscriber_id)
    }
}
