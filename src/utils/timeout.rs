//! Timeout utilities for fault tolerance
//!
//! Provides timeout wrappers for operations that might hang. Callers supply
//! the duration explicitly (keepalive pong wait, block-service HTTP fetch)
//! rather than relying on a blanket default.

use std::time::Duration;
use tokio::time::{timeout, Timeout};

/// Apply timeout to a future
pub fn with_timeout<F>(future: F, duration: Duration) -> Timeout<F>
where
    F: std::future::Future,
{
    timeout(duration, future)
}

/// Execute operation with a caller-supplied timeout
pub async fn with_custom_timeout<F, T>(
    operation: F,
    duration: Duration,
) -> Result<T, tokio::time::error::Elapsed>
where
    F: std::future::Future<Output = T>,
{
    timeout(duration, operation).await
}
