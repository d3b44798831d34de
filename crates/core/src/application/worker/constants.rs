// Worker constants (no magic values)
use std::time::Duration;

/// Sleep after a non-fatal store error before polling again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Spread of the deterministic backoff jitter, in percent either side
pub const BACKOFF_JITTER_PERCENT: u64 = 10;

/// Prefix for generated lease-owner identities
pub const WORKER_ID_PREFIX: &str = "gantry";
