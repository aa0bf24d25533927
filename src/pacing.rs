//! Request pacing: randomized jitter and probe rate limiting.
//!
//! Jitter is modeled as a [`Pacing`] policy object that stages call before
//! each network-touching operation. Sleeping happens on the calling task
//! only, so other workers in the same pool keep running. Tests swap in
//! [`NoDelay`].

use async_trait::async_trait;
use governor::{Quota, RateLimiter as GovLimiter};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Bounds of a randomized delay, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl JitterWindow {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Window used between individual WAF fingerprint probes.
    pub const WAF_PROBE: Self = Self::new(300, 1_000);

    /// Window used between cloud bucket probes.
    pub const BUCKET_PROBE: Self = Self::new(500, 2_000);

    /// Pick a delay inside the window.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (lo, hi) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

/// Scheduling policy invoked before each network operation.
#[async_trait]
pub trait Pacing: Send + Sync {
    /// Delay the calling task by some amount inside `window`.
    async fn pause(&self, window: JitterWindow);
}

/// Sleeps for a uniformly random time inside the window.
#[derive(Debug, Default, Clone, Copy)]
pub struct JitterPacer;

#[async_trait]
impl Pacing for JitterPacer {
    async fn pause(&self, window: JitterWindow) {
        let delay = window.sample(&mut rand::thread_rng());
        tokio::time::sleep(delay).await;
    }
}

/// Never sleeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

#[async_trait]
impl Pacing for NoDelay {
    async fn pause(&self, _window: JitterWindow) {}
}

type DirectLimiter = GovLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Token bucket shared by every worker of a probe pool.
///
/// Caps how many in-process probes start per second, independently of the
/// jitter each worker applies.
#[derive(Clone)]
pub struct ProbeLimiter {
    limiter: Option<Arc<DirectLimiter>>,
}

impl ProbeLimiter {
    /// Limit to `rate` probes per second. A rate of 0 disables limiting.
    pub fn per_second(rate: u32) -> Self {
        let limiter = NonZeroU32::new(rate)
            .map(|rate| Arc::new(GovLimiter::direct(Quota::per_second(rate))));
        Self { limiter }
    }

    /// Wait until the bucket allows another probe.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Try to take a token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.as_ref().map_or(true, |l| l.check().is_ok())
    }
}

impl std::fmt::Debug for ProbeLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeLimiter")
            .field("limited", &self.limiter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Instant;

    #[test]
    fn test_sample_stays_in_window() {
        let mut rng = StdRng::seed_from_u64(7);
        let window = JitterWindow::new(200, 1_000);
        for _ in 0..200 {
            let d = window.sample(&mut rng);
            assert!(d >= Duration::from_millis(200) && d <= Duration::from_millis(1_000));
        }
    }

    #[test]
    fn test_inverted_window_is_tolerated() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = JitterWindow::new(50, 10).sample(&mut rng);
        assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_no_delay_returns_immediately() {
        let start = Instant::now();
        NoDelay.pause(JitterWindow::new(5_000, 10_000)).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_jitter_pacer_sleeps_at_least_min() {
        let start = Instant::now();
        JitterPacer.pause(JitterWindow::new(20, 40)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_jitter_only_delays_its_own_worker() {
        use futures::stream::{self, StreamExt};

        let start = Instant::now();
        let windows = [
            ("slow", JitterWindow::new(400, 500)),
            ("fast", JitterWindow::new(5, 10)),
        ];
        let finished: Vec<(&str, Duration)> = stream::iter(windows)
            .map(|(name, window)| async move {
                JitterPacer.pause(window).await;
                (name, start.elapsed())
            })
            .buffer_unordered(2)
            .collect()
            .await;

        assert_eq!(finished[0].0, "fast");
        assert!(finished[0].1 < Duration::from_millis(300));
        assert_eq!(finished[1].0, "slow");
        assert!(finished[1].1 >= Duration::from_millis(400));
    }

    #[test]
    fn test_probe_limiter() {
        let limiter = ProbeLimiter::per_second(100);
        assert!(limiter.try_acquire());
        tokio_test::block_on(limiter.wait());

        let unlimited = ProbeLimiter::per_second(0);
        for _ in 0..1_000 {
            assert!(unlimited.try_acquire());
        }
    }

    #[test]
    fn test_limiter_clones_share_state() {
        let a = ProbeLimiter::per_second(1);
        let b = a.clone();
        assert!(a.try_acquire());
        assert!(!b.try_acquire());
    }
}
