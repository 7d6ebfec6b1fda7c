//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::SyncError;

/// Wrap a future with an optional timeout.
///
/// `None` awaits the future as-is. On expiry the future is dropped and
/// [`SyncError::Timeout`] is converted into the caller's error type.
pub async fn with_timeout<T, E>(
    duration: Option<Duration>,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, E>
where
    E: From<SyncError>,
{
    let Some(duration) = duration else {
        return future.await;
    };
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout(duration.as_millis() as u64).into()),
    }
}
