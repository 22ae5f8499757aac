//! Backoff between queue failures.
//!
//! Two distinct waits: `retry` keeps the current connection and tries the
//! command again, `reconnect` throws the connection away first. Both add a
//! uniform jitter in `0..=jitter`.

use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;

use crate::config::RetrySection;
use crate::lifecycle::shutdown_requested;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_delay: Duration,
    pub reconnect_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetrySection::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetrySection) -> Self {
        Self {
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
            reconnect_delay: Duration::from_millis(cfg.reconnect_delay_ms),
            jitter: Duration::from_millis(cfg.jitter_ms),
        }
    }

    pub fn retry_wait(&self) -> Duration {
        self.retry_delay + self.sample_jitter()
    }

    pub fn reconnect_wait(&self) -> Duration {
        self.reconnect_delay + self.sample_jitter()
    }

    fn sample_jitter(&self) -> Duration {
        let max = self.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max))
    }
}

/// Sleep for `wait`. Returns `true` if shutdown was requested meanwhile.
pub async fn backoff(wait: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = shutdown_requested(shutdown) => true,
        _ = tokio::time::sleep(wait) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_queue_contract() {
        let p = RetryPolicy::default();
        assert_eq!(p.retry_wait(), Duration::from_secs(5));
        assert_eq!(p.reconnect_wait(), Duration::from_secs(10));
    }

    #[test]
    fn jitter_is_bounded() {
        let p = RetryPolicy {
            retry_delay: Duration::from_millis(100),
            reconnect_delay: Duration::from_millis(200),
            jitter: Duration::from_millis(50),
        };
        for _ in 0..200 {
            let w = p.retry_wait();
            assert!(w >= Duration::from_millis(100) && w <= Duration::from_millis(150), "{w:?}");
            let w = p.reconnect_wait();
            assert!(w >= Duration::from_millis(200) && w <= Duration::from_millis(250), "{w:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_is_cut_short_by_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { backoff(Duration::from_secs(3600), &mut rx).await });
        tokio::task::yield_now().await;
        tx.send(true).unwrap();
        assert!(waiter.await.unwrap());
    }
}
