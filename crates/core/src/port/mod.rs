// Port Layer - Interfaces for transports and injected collaborators

pub mod queue_backend;
pub mod send_interceptor;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use queue_backend::{QueueBackend, SendPolicy, TransportError};
pub use send_interceptor::{NoopInterceptor, SendInterceptor};
pub use time_provider::TimeProvider;
