// ipcq Core - Queue Contract, Domain & Ports
// NO infrastructure dependencies (ADR-001: Hexagonal Architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{Queue, SendContext, SendOutcome};
pub use error::{AppError, Result};

/// Target of the queue's observable log events, independent of module layout
pub const LOG_TARGET: &str = "ipcq";
