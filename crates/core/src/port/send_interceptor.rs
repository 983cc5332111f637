// Send Interceptor Port - formatting and before/after-send hooks

use crate::domain::Message;

/// Hooks around the send path
///
/// All methods have pass-through defaults, so an implementation only
/// overrides the hooks it needs.
pub trait SendInterceptor: Send + Sync {
    /// Transform a freshly built message before anything else sees it
    fn format_message(&self, message: Message) -> Message {
        message
    }

    /// Return `false` to veto the send
    ///
    /// A vetoed message is dropped without error and never reaches the backend.
    fn before_send(&self, _message: &Message) -> bool {
        true
    }

    /// Called once the backend accepted the message
    fn after_send(&self, _message: &Message) {}
}

/// Interceptor that leaves every message untouched
pub struct NoopInterceptor;

impl SendInterceptor for NoopInterceptor {}
