//! Bounded event queue — the shared backpressure primitive.
//! Mission: give every producer/consumer pair in the engine one well-tested
//! way to bound memory and observe backpressure.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::timeout;

/// Overflow behavior selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Suspend the producer until space frees up or a deadline elapses.
    Block,
    /// Evict the head to make room, atomically with the new insertion.
    DropOldest,
    /// Reject the incoming item; the queue is unchanged.
    DropNewest,
    /// Fail the enqueue explicitly.
    Raise,
}

/// Enqueue failed because the queue was full under a non-blocking policy,
/// or a BLOCK deadline elapsed.
#[derive(Debug, thiserror::Error)]
#[error("queue is full")]
pub struct QueueFullError<T> {
    pub item: T,
}

/// A small fixed-bucket latency histogram for queue wait times: cheap to
/// record on every accepted operation, read-only snapshot for observability.
#[derive(Debug, Default)]
pub struct WaitHistogram {
    samples_us: Mutex<VecDeque<u64>>,
    max_samples: usize,
}

impl WaitHistogram {
    fn new() -> Self {
        Self {
            samples_us: Mutex::new(VecDeque::with_capacity(1024)),
            max_samples: 1024,
        }
    }

    fn record(&self, wait: Duration) {
        let mut samples = self.samples_us.lock();
        if samples.len() >= self.max_samples {
            samples.pop_front();
        }
        samples.push_back(wait.as_micros() as u64);
    }

    fn percentile(&self, p: f64) -> u64 {
        let samples = self.samples_us.lock();
        if samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted[idx]
    }

    pub fn p50(&self) -> u64 {
        self.percentile(0.50)
    }

    pub fn p99(&self) -> u64 {
        self.percentile(0.99)
    }
}

/// Read-only counters, safe to sample concurrently with producer/consumer
/// activity; an eventually-consistent snapshot is acceptable here.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub capacity: usize,
    pub current_size: usize,
    pub enqueued: u64,
    pub dequeued: u64,
    pub dropped: u64,
    pub enqueue_wait_p50_us: u64,
    pub enqueue_wait_p99_us: u64,
}

struct Inner<T> {
    items: VecDeque<T>,
}

/// A FIFO queue with a fixed capacity and a selectable overflow policy.
///
/// Built as a single `parking_lot`-guarded primitive rather than on top of
/// `tokio::sync::mpsc`, since the DROP_OLDEST policy needs synchronous,
/// atomic evict-then-insert semantics a channel can't express.
pub struct BoundedEventQueue<T> {
    capacity: usize,
    policy: OverflowPolicy,
    inner: Mutex<Inner<T>>,
    not_full: Notify,
    not_empty: Notify,
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    dropped: AtomicU64,
    enqueue_wait: WaitHistogram,
    overflow_hook: Mutex<Option<Arc<dyn Fn(T) + Send + Sync>>>,
}

impl<T: Send + 'static> BoundedEventQueue<T> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            capacity,
            policy,
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
            }),
            not_full: Notify::new(),
            not_empty: Notify::new(),
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            enqueue_wait: WaitHistogram::new(),
            overflow_hook: Mutex::new(None),
        }
    }

    /// Install a hook invoked (synchronously, must not block) for every
    /// evicted or rejected item.
    pub fn set_overflow_hook(&self, hook: Arc<dyn Fn(T) + Send + Sync>) {
        *self.overflow_hook.lock() = Some(hook);
    }

    fn fire_overflow_hook(&self, item: T) {
        if let Some(hook) = self.overflow_hook.lock().as_ref() {
            hook(item);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            capacity: self.capacity,
            current_size: self.len(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            enqueue_wait_p50_us: self.enqueue_wait.p50(),
            enqueue_wait_p99_us: self.enqueue_wait.p99(),
        }
    }

    /// Enqueue one item, honoring the configured overflow policy.
    ///
    /// `deadline` is only consulted under [`OverflowPolicy::Block`]; it is
    /// ignored by the other three policies, which never suspend.
    pub async fn put(&self, item: T, deadline: Option<Duration>) -> Result<(), QueueFullError<T>> {
        let start = Instant::now();
        loop {
            {
                let mut inner = self.inner.lock();
                if inner.items.len() < self.capacity {
                    inner.items.push_back(item);
                    drop(inner);
                    self.enqueued.fetch_add(1, Ordering::Relaxed);
                    self.enqueue_wait.record(start.elapsed());
                    self.not_empty.notify_one();
                    return Ok(());
                }

                match self.policy {
                    OverflowPolicy::DropOldest => {
                        // Atomic with respect to other callers: both the
                        // eviction and the insertion happen while holding
                        // the lock, so no observer ever sees a transient
                        // empty slot in a full queue.
                        let evicted = inner.items.pop_front();
                        inner.items.push_back(item);
                        drop(inner);
                        if let Some(evicted) = evicted {
                            self.dropped.fetch_add(1, Ordering::Relaxed);
                            self.fire_overflow_hook(evicted);
                        }
                        self.enqueued.fetch_add(1, Ordering::Relaxed);
                        self.enqueue_wait.record(start.elapsed());
                        self.not_empty.notify_one();
                        return Ok(());
                    }
                    OverflowPolicy::DropNewest => {
                        drop(inner);
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        self.fire_overflow_hook(item);
                        return Ok(());
                    }
                    OverflowPolicy::Raise => {
                        drop(inner);
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        return Err(QueueFullError { item });
                    }
                    OverflowPolicy::Block => {
                        // fall through to await below
                    }
                }
            }

            debug_assert_eq!(self.policy, OverflowPolicy::Block);
            let remaining = deadline.map(|d| d.saturating_sub(start.elapsed()));
            if matches!(remaining, Some(r) if r.is_zero()) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                self.fire_overflow_hook(item);
                return Err(QueueFullError { item });
            }
            let wait = self.not_full.notified();
            match remaining {
                Some(remaining) => {
                    if timeout(remaining, wait).await.is_err() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        self.fire_overflow_hook(item);
                        return Err(QueueFullError { item });
                    }
                }
                None => wait.await,
            }
            // Space may have freed; loop back and re-check capacity with the
            // same item, same original deadline.
        }
    }

    /// Remove and return the head item, suspending until one is available.
    pub async fn get(&self) -> T {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(item) = inner.items.pop_front() {
                    drop(inner);
                    self.dequeued.fetch_add(1, Ordering::Relaxed);
                    self.not_full.notify_one();
                    return item;
                }
            }
            self.not_empty.notified().await;
        }
    }

    /// Non-suspending variant of [`Self::get`].
    pub fn try_get(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front();
        drop(inner);
        if item.is_some() {
            self.dequeued.fetch_add(1, Ordering::Relaxed);
            self.not_full.notify_one();
        }
        item
    }
}
