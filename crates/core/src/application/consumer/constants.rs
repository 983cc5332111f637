// Consumer constants (ADR: No magic values)
use std::time::Duration;

/// Sleep duration when the queue had nothing to deliver (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a receive error before polling again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Messages drained per poll unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 32;
