// Capability Matrix - which operations a backend can perform

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operations of the queue contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Send,
    Peek,
    Reserve,
    Receive,
    Delete,
    Release,
    ReleaseTimedOut,
    Subscribe,
    Unsubscribe,
    IsSubscribed,
    GetSubscriptions,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::Send,
        Operation::Peek,
        Operation::Reserve,
        Operation::Receive,
        Operation::Delete,
        Operation::Release,
        Operation::ReleaseTimedOut,
        Operation::Subscribe,
        Operation::Unsubscribe,
        Operation::IsSubscribed,
        Operation::GetSubscriptions,
    ];

    const fn bit(self) -> u16 {
        1 << self as u16
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Send => "send",
            Operation::Peek => "peek",
            Operation::Reserve => "reserve",
            Operation::Receive => "receive",
            Operation::Delete => "delete",
            Operation::Release => "release",
            Operation::ReleaseTimedOut => "release_timed_out",
            Operation::Subscribe => "subscribe",
            Operation::Unsubscribe => "unsubscribe",
            Operation::IsSubscribed => "is_subscribed",
            Operation::GetSubscriptions => "get_subscriptions",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static set of operations a backend declares as supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u16);

impl Capabilities {
    /// Build a set from a list, usable in `const` declarations
    pub const fn of(operations: &[Operation]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < operations.len() {
            bits |= operations[i].bit();
            i += 1;
        }
        Self(bits)
    }

    pub fn supports(&self, operation: Operation) -> bool {
        self.0 & operation.bit() != 0
    }

    pub fn supported(&self) -> impl Iterator<Item = Operation> + '_ {
        Operation::ALL.into_iter().filter(|op| self.supports(*op))
    }
}

/// Why a backend refuses an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedReason {
    /// The transport itself cannot provide this operation
    Transport(&'static str),
    /// The backend could support it but does not implement it yet
    NotImplemented,
}

/// A backend was asked for an operation outside its capability matrix
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} is not supported by the {backend} backend: {}", self.explanation())]
pub struct UnsupportedOperation {
    pub backend: &'static str,
    pub operation: Operation,
    pub reason: UnsupportedReason,
}

impl UnsupportedOperation {
    pub fn transport(backend: &'static str, operation: Operation, why: &'static str) -> Self {
        Self {
            backend,
            operation,
            reason: UnsupportedReason::Transport(why),
        }
    }

    pub fn not_implemented(backend: &'static str, operation: Operation) -> Self {
        Self {
            backend,
            operation,
            reason: UnsupportedReason::NotImplemented,
        }
    }

    pub fn explanation(&self) -> &'static str {
        match self.reason {
            UnsupportedReason::Transport(why) => why,
            UnsupportedReason::NotImplemented => "not implemented",
        }
    }

    /// True when no implementation could ever support the operation on this transport
    pub fn is_transport_limit(&self) -> bool {
        matches!(self.reason, UnsupportedReason::Transport(_))
    }
}
