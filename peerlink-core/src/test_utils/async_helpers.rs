//! Async test helpers
//!
//! Utilities for testing asynchronous code: channel receives with timeouts and
//! polling for an eventually-true condition.

use std::future::Future;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep, timeout, Duration};

/// Helper for receiving from a channel with a timeout
pub async fn recv_timeout<T>(
    rx: &mut mpsc::Receiver<T>,
    duration: Duration,
) -> Result<T, RecvTimeoutError> {
    timeout(duration, rx.recv())
        .await
        .map_err(|_| RecvTimeoutError::Timeout)?
        .ok_or(RecvTimeoutError::Closed)
}

/// Helper for receiving from a oneshot channel with a timeout
pub async fn recv_oneshot_timeout<T>(
    rx: oneshot::Receiver<T>,
    duration: Duration,
) -> Result<T, RecvTimeoutError> {
    timeout(duration, rx)
        .await
        .map_err(|_| RecvTimeoutError::Timeout)?
        .map_err(|_| RecvTimeoutError::Closed)
}

/// Helper for receiving from a broadcast channel with a timeout.
/// Lagged receivers are treated as closed.
pub async fn recv_broadcast_timeout<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    duration: Duration,
) -> Result<T, RecvTimeoutError> {
    timeout(duration, rx.recv())
        .await
        .map_err(|_| RecvTimeoutError::Timeout)?
        .map_err(|_| RecvTimeoutError::Closed)
}

/// Poll an async condition until it holds or the deadline passes
pub async fn wait_until<F, Fut>(deadline: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let started = tokio::time::Instant::now();
    loop {
        if condition().await {
            return true;
        }
        if started.elapsed() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(20)).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvTimeoutError {
    Timeout,
    Closed,
}

impl std::fmt::Display for RecvTimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecvTimeoutError::Timeout => write!(f, "receive operation timed out"),
            RecvTimeoutError::Closed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for RecvTimeoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_timeout_delivers_value() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(7u32).await.unwrap();
        assert_eq!(recv_timeout(&mut rx, Duration::from_secs(1)).await, Ok(7));
    }

    #[tokio::test]
    async fn test_recv_timeout_times_out() {
        let (_tx, mut rx) = mpsc::channel::<u32>(1);
        assert_eq!(
            recv_timeout(&mut rx, Duration::from_millis(10)).await,
            Err(RecvTimeoutError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_wait_until() {
        let started = tokio::time::Instant::now();
        assert!(wait_until(Duration::from_secs(1), || async { true }).await);
        assert!(!wait_until(Duration::from_millis(50), || async { false }).await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
