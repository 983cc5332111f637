// Queue Domain Model

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, Result};
use super::message::SubscriberId;

/// Default channel creation mode (world read/write)
pub const DEFAULT_PERMISSIONS: u32 = 0o666;

/// Queue identifier
///
/// Exactly one non-zero byte: System V keys are derived from a single
/// discriminating byte, and `ftok` leaves a zero project id unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueId(u8);

impl QueueId {
    pub fn parse(id: &str) -> Result<Self> {
        match id.as_bytes() {
            [byte] if *byte != 0 => Ok(Self(*byte)),
            bytes => Err(ConfigError::InvalidQueueId {
                id: id.to_string(),
                len: bytes.len(),
            }),
        }
    }

    pub fn as_byte(&self) -> u8 {
        self.0
    }
}

impl TryFrom<String> for QueueId {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<QueueId> for String {
    fn from(id: QueueId) -> Self {
        id.to_string()
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0 as char)
    }
}

/// Queue configuration, fixed once the queue is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQueueConfig")]
pub struct QueueConfig {
    id: QueueId,
    label: String,
    blocking: bool,
    permissions: u32,
}

/// Unvalidated shape accepted from host configuration files
#[derive(Deserialize)]
struct RawQueueConfig {
    id: QueueId,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    blocking: bool,
    #[serde(default = "default_permissions")]
    permissions: u32,
}

fn default_permissions() -> u32 {
    DEFAULT_PERMISSIONS
}

impl TryFrom<RawQueueConfig> for QueueConfig {
    type Error = ConfigError;

    fn try_from(raw: RawQueueConfig) -> Result<Self> {
        let label = raw.label.unwrap_or_else(|| raw.id.to_string());
        let config = Self {
            id: raw.id,
            label,
            blocking: raw.blocking,
            permissions: raw.permissions,
        };
        config.validate()?;
        Ok(config)
    }
}

impl QueueConfig {
    /// Create a non-blocking configuration with default permissions
    ///
    /// Fails immediately if `id` is not exactly one non-zero byte.
    pub fn new(id: &str, label: impl Into<String>) -> Result<Self> {
        Ok(Self {
            id: QueueId::parse(id)?,
            label: label.into(),
            blocking: false,
            permissions: DEFAULT_PERMISSIONS,
        })
    }

    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn with_permissions(mut self, permissions: u32) -> Result<Self> {
        self.permissions = permissions;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.permissions & !0o777 != 0 {
            return Err(ConfigError::InvalidPermissions(self.permissions));
        }
        Ok(())
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn blocking(&self) -> bool {
        self.blocking
    }

    pub fn permissions(&self) -> u32 {
        self.permissions
    }
}

/// Maximum number of messages a single receive call may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    #[default]
    Unbounded,
    AtMost(usize),
}

impl Limit {
    /// Map the conventional integer form: `-1` is unbounded
    ///
    /// Other negative values never admit a message.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            -1 => Limit::Unbounded,
            n if n < 0 => Limit::AtMost(0),
            n => Limit::AtMost(n as usize),
        }
    }

    /// Whether `count` already satisfies the limit
    pub fn is_reached(&self, count: usize) -> bool {
        match self {
            Limit::Unbounded => false,
            Limit::AtMost(max) => count >= *max,
        }
    }
}

/// Subscription of a subscriber to message categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscriber_id: SubscriberId,
    pub label: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub exceptions: Vec<String>,
}

impl Subscription {
    pub fn new(subscriber_id: impl Into<SubscriberId>) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            label: None,
            categories: Vec::new(),
            exceptions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_id_requires_one_byte() {
        assert!(QueueId::parse("q").is_ok());
        assert!(matches!(
            QueueId::parse(""),
            Err(ConfigError::InvalidQueueId { len: 0, .. })
        ));
        assert!(matches!(
            QueueId::parse("qq"),
            Err(ConfigError::InvalidQueueId { len: 2, .. })
        ));
        // One character, two bytes
        assert!(QueueId::parse("é").is_err());
    }

    #[test]
    fn test_queue_id_rejects_nul_byte() {
        assert!(matches!(
            QueueId::parse("\0"),
            Err(ConfigError::InvalidQueueId { len: 1, .. })
        ));
        assert!(serde_json::from_str::<QueueConfig>(r#"{"id": "\u0000"}"#).is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = QueueConfig::new("a", "alerts").unwrap();

        assert_eq!(config.id().as_byte(), b'a');
        assert_eq!(config.label(), "alerts");
        assert!(!config.blocking());
        assert_eq!(config.permissions(), DEFAULT_PERMISSIONS);
    }

    #[test]
    fn test_config_rejects_long_id() {
        let err = QueueConfig::new("alerts", "alerts").unwrap_err();
        assert!(err.to_string().contains("exactly one non-zero byte"));
    }

    #[test]
    fn test_config_rejects_bad_permissions() {
        let result = QueueConfig::new("a", "alerts")
            .unwrap()
            .with_permissions(0o4777);
        assert_eq!(result.unwrap_err(), ConfigError::InvalidPermissions(0o4777));

        let config = QueueConfig::new("a", "alerts")
            .unwrap()
            .with_permissions(0o600)
            .unwrap();
        assert_eq!(config.permissions(), 0o600);
    }

    #[test]
    fn test_config_from_json() {
        let config: QueueConfig =
            serde_json::from_str(r#"{"id": "m", "label": "mail", "blocking": true}"#).unwrap();
        assert_eq!(config.id().to_string(), "m");
        assert!(config.blocking());
        assert_eq!(config.permissions(), DEFAULT_PERMISSIONS);

        let unlabeled: QueueConfig = serde_json::from_str(r#"{"id": "m"}"#).unwrap();
        assert_eq!(unlabeled.label(), "m");

        assert!(serde_json::from_str::<QueueConfig>(r#"{"id": "mail"}"#).is_err());
        assert!(serde_json::from_str::<QueueConfig>(r#"{"id": "m", "permissions": 4096}"#).is_err());
    }

    #[test]
    fn test_limit_from_raw() {
        assert_eq!(Limit::from_raw(-1), Limit::Unbounded);
        assert_eq!(Limit::from_raw(-3), Limit::AtMost(0));
        assert_eq!(Limit::from_raw(2), Limit::AtMost(2));

        assert!(!Limit::Unbounded.is_reached(usize::MAX));
        assert!(Limit::AtMost(2).is_reached(2));
        assert!(!Limit::AtMost(2).is_reached(1));
        assert!(Limit::AtMost(0).is_reached(0));
    }
}
