//! mi.tv request pacing.

use std::time::{Duration, Instant};

/// Enforces a minimum interval between consecutive requests.
///
/// Shared by every channel worker of a run through `Arc<Mutex<_>>`.
#[derive(Debug)]
pub struct RequestPacer {
    /// Minimum interval between requests.
    min_interval: Duration,
    /// Last request timestamp.
    last_request: Option<Instant>,
    /// Requests issued so far.
    issued: u64,
}

impl RequestPacer {
    /// Creates a new pacer.
    pub(crate) const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
            issued: 0,
        }
    }

    /// Waits until the next request is allowed, then records it.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = Instant::now().duration_since(last);
            if elapsed < self.min_interval {
                let remaining = self.min_interval.saturating_sub(elapsed);
                tracing::trace!(remaining_ms = remaining.as_millis(), "Pacing request");
                tokio::time::sleep(remaining).await;
            }
        }

        self.last_request = Some(Instant::now());
        self.issued = self.issued.saturating_add(1);
    }

    /// Requests issued so far.
    pub(crate) const fn issued(&self) -> u64 {
        self.issued
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn test_pacer_min_interval() {
        // Arrange
        let mut pacer = RequestPacer::new(Duration::from_millis(50));

        // Act
        let start = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        let elapsed = start.elapsed();

        // Assert: second request should wait at least 50ms
        assert!(elapsed >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pacer_first_request_no_wait() {
        // Arrange
        let mut pacer = RequestPacer::new(Duration::from_secs(1));

        // Act
        let start = Instant::now();
        pacer.wait().await;
        let elapsed = start.elapsed();

        // Assert: first request should pass immediately
        assert!(elapsed < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_pacer_counts_requests() {
        // Arrange
        let mut pacer = RequestPacer::new(Duration::from_millis(0));

        // Act
        pacer.wait().await;
        pacer.wait().await;
        pacer.wait().await;

        // Assert
        assert_eq!(pacer.issued(), 3);
    }
}
