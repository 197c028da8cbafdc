//! Bounded retry for idempotent reads

use std::future::Future;
use std::time::Duration;

use safetransfer_core::config::BlobStoreConfig;
use safetransfer_core::SafeTransferResult;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    /// Linear step: the n-th retry waits `n * backoff`
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &BlobStoreConfig) -> Self {
        Self {
            retries: config.transport_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    pub fn none() -> Self {
        Self {
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Run `op`, retrying only on retryable (transport) errors.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> SafeTransferResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SafeTransferResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    let delay = self.backoff * attempt;
                    warn!(
                        what,
                        attempt,
                        max = self.retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transport error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safetransfer_core::SafeTransferError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast(2)
            .run("op", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SafeTransferError::Transport("reset".into()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: SafeTransferResult<()> = fast(2)
            .run("op", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SafeTransferError::Transport("down".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transport_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: SafeTransferResult<()> = fast(5)
            .run("op", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SafeTransferError::Integrity("bad tag".into()))
            })
            .await;
        assert!(matches!(result, Err(SafeTransferError::Integrity(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
