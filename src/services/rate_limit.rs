//! Per-client fixed-window admission control.
//!
//! Each client key (normally the source IP) gets a counter that resets once
//! its window has elapsed. The map is split into shards, each behind its own
//! mutex, so the read-increment-compare sequence for a key is atomic without
//! making unrelated clients queue on a single lock.
//!
//! A fixed window admits up to twice the limit in a burst that straddles a
//! window boundary. That imprecision is accepted.
//!
//! Entries are created lazily and removed by a background sweeper once idle
//! for longer than the window. State is process-local and lost on restart.

use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::constants::rate_limit::SHARD_COUNT;

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Rejected { retry_after: Duration },
}

impl Admission {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    window_start: Instant,
    last_seen: Instant,
    count: u32,
}

impl RateLimitEntry {
    const fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            last_seen: now,
            count: 0,
        }
    }
}

type Shard = Mutex<HashMap<String, RateLimitEntry>>;

pub struct RateLimiter {
    limit: u32,
    window: Duration,
    shards: Box<[Shard]>,
    hasher: RandomState,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            limit,
            window,
            shards,
            hasher: RandomState::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_window, config.window())
    }

    /// Count a request from `key` and decide whether to let it through.
    pub fn admit(&self, key: &str) -> Admission {
        self.admit_at(key, Instant::now())
    }

    fn admit_at(&self, key: &str, now: Instant) -> Admission {
        let admission = {
            let mut shard = self.shard(key);
            let entry = shard
                .entry(key.to_owned())
                .or_insert_with(|| RateLimitEntry::new(now));

            let elapsed = now.saturating_duration_since(entry.window_start);
            if elapsed > self.window {
                entry.window_start = now;
                entry.count = 0;
            }

            entry.last_seen = now;
            entry.count = entry.count.saturating_add(1);

            if entry.count > self.limit {
                let elapsed = now.saturating_duration_since(entry.window_start);
                Admission::Rejected {
                    retry_after: self.window.saturating_sub(elapsed),
                }
            } else {
                Admission::Allowed {
                    remaining: self.limit - entry.count,
                }
            }
        };

        if let Admission::Rejected { retry_after } = admission {
            warn!(
                client = %key,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            metrics::counter!("rate_limit_rejected_total").increment(1);
        }

        admission
    }

    /// Drop entries idle for longer than the window. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut removed = 0;

        // One shard at a time keeps each critical section short.
        for shard in &self.shards {
            let mut entries = shard.lock().unwrap_or_else(PoisonError::into_inner);
            let before = entries.len();
            entries.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= self.window);
            removed += before - entries.len();
        }

        removed
    }

    /// Number of client keys currently held in memory.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Start the periodic sweep on the current tokio runtime.
    ///
    /// The task runs until [`SweeperHandle::shutdown`] is called or the handle
    /// is dropped.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let limiter = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            debug!(interval_secs = interval.as_secs(), "Rate limiter sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = limiter.tracked_clients(), "Swept idle rate limit entries");
                        }
                    }
                    _ = stop.changed() => break,
                }
            }

            debug!("Rate limiter sweeper stopped");
        });

        SweeperHandle { shutdown, task }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn shard(&self, key: &str) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        let index = (self.hasher.hash_one(key) as usize) % self.shards.len();
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owner of the background sweep task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Rate limiter sweeper ended abnormally: {}", e);
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const CLIENT_A: &str = "192.168.1.1";
    const CLIENT_B: &str = "192.168.1.2";

    #[test]
    fn test_new_limiter_is_empty() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_admits_exactly_limit_within_window() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let now = Instant::now();

        for i in 0..5 {
            assert_eq!(
                limiter.admit_at(CLIENT_A, now),
                Admission::Allowed { remaining: 4 - i }
            );
        }

        assert!(!limiter.admit_at(CLIENT_A, now).is_allowed());
        assert!(!limiter.admit_at(CLIENT_A, now).is_allowed());
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let window = Duration::from_secs(60);
        let limiter = RateLimiter::new(2, window);
        let start = Instant::now();

        assert!(limiter.admit_at(CLIENT_A, start).is_allowed());
        assert!(limiter.admit_at(CLIENT_A, start).is_allowed());
        assert!(!limiter.admit_at(CLIENT_A, start).is_allowed());

        // Exactly one window later is still the same window.
        assert!(!limiter.admit_at(CLIENT_A, start + window).is_allowed());

        let later = start + window + Duration::from_millis(1);
        assert_eq!(
            limiter.admit_at(CLIENT_A, later),
            Admission::Allowed { remaining: 1 }
        );
    }

    #[test]
    fn test_retry_after_counts_down_to_window_end() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.admit_at(CLIENT_A, start).is_allowed());
        assert_eq!(
            limiter.admit_at(CLIENT_A, start + Duration::from_secs(20)),
            Admission::Rejected {
                retry_after: Duration::from_secs(40)
            }
        );
    }

    #[test]
    fn test_different_clients_tracked_separately() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.admit_at(CLIENT_A, now).is_allowed());
        assert!(limiter.admit_at(CLIENT_A, now).is_allowed());
        assert!(!limiter.admit_at(CLIENT_A, now).is_allowed());

        assert!(limiter.admit_at(CLIENT_B, now).is_allowed());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_sweep_removes_idle_clients_only() {
        let window = Duration::from_secs(60);
        let limiter = RateLimiter::new(10, window);
        let start = Instant::now();

        limiter.admit_at(CLIENT_A, start);
        limiter.admit_at(CLIENT_B, start + Duration::from_secs(30));

        assert_eq!(limiter.sweep_at(start + window), 0);
        assert_eq!(limiter.sweep_at(start + window + Duration::from_secs(1)), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_concurrent_admits_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new(50, Duration::from_secs(60)));
        let allowed = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let allowed = Arc::clone(&allowed);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        if limiter.admit(CLIENT_A).is_allowed() {
                            allowed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(allowed.load(Ordering::SeqCst), 50);
    }

    #[tokio::test]
    async fn test_sweeper_evicts_and_shuts_down() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_millis(1)));
        limiter.admit(CLIENT_A);
        assert_eq!(limiter.tracked_clients(), 1);

        let sweeper = limiter.spawn_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(limiter.tracked_clients(), 0);
        assert!(!sweeper.is_finished());

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_handle_dropped() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));
        let sweeper = limiter.spawn_sweeper(Duration::from_secs(60));
        let SweeperHandle { shutdown, task } = sweeper;

        drop(shutdown);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
