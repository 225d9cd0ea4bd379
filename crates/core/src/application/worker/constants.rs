// Worker loop timing (no magic values in the loop itself)
use std::time::Duration;

/// Sleep between polls that found no job
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(500);

/// Sleep after a failed poll before trying again
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Minimum spacing between registry heartbeats, idle or busy
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
