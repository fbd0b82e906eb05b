//! Per-host politeness pacing shared by all workers.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::drivers::host_of;

/// Spaces requests to the same host at least `delay` apart.
///
/// Each host has a next-allowed instant. A caller reserves the next slot
/// atomically and then sleeps until it, so concurrent workers hitting one host
/// queue up behind each other while workers on other hosts are not held back.
#[derive(Debug)]
pub struct HostPacer {
    delay: Duration,
    next_allowed: DashMap<String, Instant>,
}

impl HostPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_allowed: DashMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait until a request to `url`'s host is allowed.
    pub async fn wait(&self, url: &str) {
        if self.delay.is_zero() {
            return;
        }
        // Unparseable URLs are paced on their own text
        let key = host_of(url).unwrap_or_else(|| url.to_string());

        let now = Instant::now();
        let start = {
            let mut slot = self.next_allowed.entry(key.clone()).or_insert(now);
            let start = (*slot).max(now);
            *slot = start + self.delay;
            start
        };

        if start > now {
            tracing::debug!(host = %key, "Pacing for {}ms", (start - now).as_millis());
            tokio::time::sleep_until(start).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_same_host_is_spaced() {
        let pacer = HostPacer::new(Duration::from_millis(2000));
        let t0 = Instant::now();

        pacer.wait("https://a.test/one").await;
        assert_eq!(t0.elapsed(), Duration::ZERO);

        pacer.wait("https://a.test/two").await;
        assert!(t0.elapsed() >= Duration::from_millis(2000));
        assert!(t0.elapsed() < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_hosts_are_not_throttled() {
        let pacer = HostPacer::new(Duration::from_millis(2000));
        let t0 = Instant::now();

        pacer.wait("https://a.test/").await;
        pacer.wait("https://b.test/").await;
        pacer.wait("https://c.test/").await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_queue_up() {
        let pacer = Arc::new(HostPacer::new(Duration::from_millis(1000)));
        let t0 = Instant::now();

        let waits = (0..3).map(|_| {
            let pacer = pacer.clone();
            tokio::spawn(async move {
                pacer.wait("https://a.test/").await;
                Instant::now()
            })
        });
        let mut done: Vec<Instant> = futures::future::try_join_all(waits).await.unwrap();
        done.sort();

        assert_eq!(done[0] - t0, Duration::ZERO);
        assert!(done[1] - t0 >= Duration::from_millis(1000));
        assert!(done[2] - t0 >= Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_zero_delay_never_waits() {
        let pacer = HostPacer::new(Duration::ZERO);
        for _ in 0..5 {
            pacer.wait("https://a.test/").await;
        }
        assert!(pacer.next_allowed.is_empty());
    }
}
