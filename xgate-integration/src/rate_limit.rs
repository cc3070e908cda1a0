use fnv::FnvHashMap;
use std::{
    collections::VecDeque,
    fmt::{Debug, Formatter},
    hash::Hash,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{Mutex, oneshot},
    time::Instant,
};

/// Priority levels for rate limited operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Priority {
    High,
    Normal,
    Low,
}

#[derive(Debug)]
struct Waiter {
    tx: oneshot::Sender<()>,
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    tokens: usize,
    interval: Duration,
    last_refill: Instant,
    base_interval: Duration,
    max_interval: Duration,
    high: VecDeque<Waiter>,
    normal: VecDeque<Waiter>,
    low: VecDeque<Waiter>,
}

impl Inner {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        if elapsed < self.interval {
            return;
        }

        let periods = (elapsed.as_nanos() / self.interval.as_nanos().max(1)) as u32;
        self.last_refill += self.interval * periods;
        self.tokens = self.capacity;

        while self.tokens > 0 {
            let Some(waiter) = self
                .high
                .pop_front()
                .or_else(|| self.normal.pop_front())
                .or_else(|| self.low.pop_front())
            else {
                break;
            };

            // Waiter may have been cancelled, in which case the token is kept
            if waiter.tx.send(()).is_ok() {
                self.tokens -= 1;
            }
        }
    }

    fn until_refill(&self) -> Duration {
        (self.last_refill + self.interval).saturating_duration_since(Instant::now())
    }

    fn has_waiters(&self) -> bool {
        !(self.high.is_empty() && self.normal.is_empty() && self.low.is_empty())
    }
}

/// Token bucket rate limiter with priority queues and adaptive backoff.
///
/// Permits refill to `capacity` once every `interval`. Waiting callers are served strictly in
/// [`Priority`] order, FIFO within the same priority.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Inner>>,
}

impl Debug for RateLimiter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Construct a new [`RateLimiter`] allowing `capacity` operations every `interval`.
    pub fn new(capacity: usize, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                capacity,
                tokens: capacity,
                interval,
                last_refill: Instant::now(),
                base_interval: interval,
                max_interval: interval * 16,
                high: VecDeque::new(),
                normal: VecDeque::new(),
                low: VecDeque::new(),
            })),
        }
    }

    /// Acquire a permit according to the provided priority.
    pub async fn acquire(&self, priority: Priority) {
        let mut rx = {
            let mut inner = self.inner.lock().await;
            inner.refill();
            if inner.tokens > 0 && !inner.has_waiters() {
                inner.tokens -= 1;
                return;
            }

            let (tx, rx) = oneshot::channel();
            let waiter = Waiter { tx };
            match priority {
                Priority::High => inner.high.push_back(waiter),
                Priority::Normal => inner.normal.push_back(waiter),
                Priority::Low => inner.low.push_back(waiter),
            }
            rx
        };

        loop {
            let wait = {
                let mut inner = self.inner.lock().await;
                inner.refill();
                inner.until_refill()
            };

            tokio::select! {
                biased;
                _ = &mut rx => return,
                _ = tokio::time::sleep(wait) => continue,
            }
        }
    }

    /// Report a rate limit violation to trigger backoff.
    pub async fn report_violation(&self) {
        let mut inner = self.inner.lock().await;
        let next = inner.interval * 2;
        inner.interval = std::cmp::min(next, inner.max_interval);
    }

    /// Reset the current backoff to the base interval.
    pub async fn reset_backoff(&self) {
        let mut inner = self.inner.lock().await;
        inner.interval = inner.base_interval;
    }
}

/// Collection of [`RateLimiter`]s keyed by a caller defined `Key`.
///
/// eg/ Key = (exchange, request class). Limiters for unknown keys are created lazily from the
/// default quota, so two connections sharing a key share one budget.
#[derive(Clone)]
pub struct RateLimits<Key> {
    limiters: Arc<parking_lot::Mutex<FnvHashMap<Key, RateLimiter>>>,
    default_capacity: usize,
    default_interval: Duration,
}

impl<Key> Debug for RateLimits<Key>
where
    Key: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("keys", &self.limiters.lock().keys().collect::<Vec<_>>())
            .field("default_capacity", &self.default_capacity)
            .field("default_interval", &self.default_interval)
            .finish()
    }
}

impl<Key> RateLimits<Key>
where
    Key: Eq + Hash + Clone,
{
    pub fn new(default_capacity: usize, default_interval: Duration) -> Self {
        Self {
            limiters: Arc::new(parking_lot::Mutex::new(FnvHashMap::default())),
            default_capacity,
            default_interval,
        }
    }

    /// Register a dedicated quota for the provided `Key`, replacing any existing limiter.
    pub fn with_quota(self, key: Key, capacity: usize, interval: Duration) -> Self {
        self.limiters
            .lock()
            .insert(key, RateLimiter::new(capacity, interval));
        self
    }

    /// Fetch the [`RateLimiter`] associated with the `Key`, creating it from the default quota
    /// if it does not yet exist.
    pub fn limiter(&self, key: &Key) -> RateLimiter {
        self.limiters
            .lock()
            .entry(key.clone())
            .or_insert_with(|| RateLimiter::new(self.default_capacity, self.default_interval))
            .clone()
    }

    /// Acquire a permit from the [`RateLimiter`] associated with the `Key`.
    pub async fn acquire(&self, key: &Key, priority: Priority) {
        let limiter = self.limiter(key);
        limiter.acquire(priority).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, Instant, sleep};

    #[tokio::test]
    async fn test_rate_limit_basic() {
        let rl = RateLimiter::new(2, Duration::from_millis(50));
        rl.acquire(Priority::Normal).await;
        rl.acquire(Priority::Normal).await;
        let start = Instant::now();
        rl.acquire(Priority::Normal).await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_acquire_waits_once_exhausted() {
        let rl = RateLimiter::new(1, Duration::from_secs(60));
        rl.acquire(Priority::Normal).await;

        let mut acquire = tokio_test::task::spawn(rl.acquire(Priority::High));
        tokio_test::assert_pending!(acquire.poll());
        tokio_test::assert_pending!(acquire.poll());
    }

    #[tokio::test]
    async fn test_priority_queue() {
        let rl = RateLimiter::new(1, Duration::from_millis(40));
        // consume initial token
        rl.acquire(Priority::Normal).await;
        let rl1 = rl.clone();
        let t1 = tokio::spawn(async move {
            rl1.acquire(Priority::Low).await;
            Instant::now()
        });
        sleep(Duration::from_millis(10)).await;
        let rl2 = rl.clone();
        let t2 = tokio::spawn(async move {
            rl2.acquire(Priority::High).await;
            Instant::now()
        });
        let time_high = t2.await.unwrap();
        let time_low = t1.await.unwrap();
        assert!(time_high <= time_low);
    }

    #[tokio::test]
    async fn test_adaptive_backoff() {
        let rl = RateLimiter::new(1, Duration::from_millis(30));
        rl.acquire(Priority::Normal).await;
        rl.report_violation().await;
        let start = Instant::now();
        rl.acquire(Priority::Normal).await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_reset_backoff_restores_base_interval() {
        let rl = RateLimiter::new(1, Duration::from_millis(40));
        rl.report_violation().await;
        rl.report_violation().await;
        rl.reset_backoff().await;

        rl.acquire(Priority::Normal).await;
        let start = Instant::now();
        rl.acquire(Priority::Normal).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(20));
        assert!(elapsed < Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_rate_limits_share_budget_per_key() {
        let limits = RateLimits::new(1, Duration::from_millis(60))
            .with_quota("binance", 2, Duration::from_millis(60));

        // Dedicated quota allows two immediate permits
        let start = Instant::now();
        limits.acquire(&"binance", Priority::Normal).await;
        limits.acquire(&"binance", Priority::Normal).await;
        assert!(start.elapsed() < Duration::from_millis(30));

        // Default quota for a lazily created key allows one, and clones share it
        let shared = limits.clone();
        limits.acquire(&"bitmex", Priority::Normal).await;
        let start = Instant::now();
        shared.acquire(&"bitmex", Priority::Normal).await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
