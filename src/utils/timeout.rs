//! Async timeout wrappers and the default durations used across the crate.

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;

/// Default timeout for connect and single send/receive operations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a session may stay silent before the reader gives up on it
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound on graceful shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between periodic world-object reward ticks
pub const REWARD_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Run a future with a timeout, mapping elapsed time to `ProtocolError::Timeout`.
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}
