//! Timeout enforcement.
//!
//! Dropping the wrapped future on expiry cancels the operation; nothing
//! keeps running in the background.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{operation} timed out after {after:?}")]
pub struct TimeoutError {
    pub operation: &'static str,
    pub after: Duration,
}

/// Run `future` with a deadline.
pub async fn with_timeout<F: Future>(
    operation: &'static str,
    after: Duration,
    future: F,
) -> Result<F::Output, TimeoutError> {
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| TimeoutError { operation, after })
}
