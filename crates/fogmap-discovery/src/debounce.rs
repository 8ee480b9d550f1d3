//! Per-key trailing-edge debounce
//!
//! [`DebounceScheduler`] delays a task until a key has been quiet for a
//! fixed interval. Scheduling the same key again before the interval
//! elapses replaces the earlier task and restarts the wait, so a burst of
//! schedules for one key runs exactly one task, after the last one.
//!
//! With a maximum wait, a key that never goes quiet still runs no later
//! than `max_wait` after the first schedule of the burst.
//!
//! The scheduler knows nothing about what the task does; the tile store
//! uses it for write-back, keyed by tile id.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::trace;

/// Schedule state of one key
#[derive(Debug, Clone, Copy)]
struct Pending {
    /// Latest schedule generation
    generation: u64,
    /// Latest firing time allowed for this burst
    deadline: Option<Instant>,
}

/// Delays keyed tasks until their key has been quiet for `delay`
pub struct DebounceScheduler<K> {
    delay: Duration,
    max_wait: Option<Duration>,
    pending: Arc<DashMap<K, Pending>>,
    next_generation: AtomicU64,
}

impl<K: Eq + Hash> std::fmt::Debug for DebounceScheduler<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceScheduler")
            .field("delay", &self.delay)
            .field("max_wait", &self.max_wait)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<K> DebounceScheduler<K>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
{
    /// Create a scheduler with the given quiet period and no maximum wait
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_wait: None,
            pending: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Cap how long a burst of schedules can postpone its task
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait
    }

    /// Run `task` once `key` has been quiet for the delay, or once the
    /// maximum wait since the burst began has passed
    ///
    /// Any task previously scheduled for `key` that has not started yet is
    /// superseded. Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, key: K, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let now = Instant::now();
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let deadline = {
            // A reschedule keeps the deadline of the first schedule
            let mut entry = self.pending.entry(key.clone()).or_insert(Pending {
                generation,
                deadline: self.max_wait.and_then(|wait| now.checked_add(wait)),
            });
            entry.generation = generation;
            entry.deadline
        };

        let quiet = now.checked_add(self.delay).unwrap_or(now);
        let fire_at = match deadline {
            Some(deadline) => quiet.min(deadline),
            None => quiet,
        };
        let pending = Arc::clone(&self.pending);

        tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;

            // Only the latest schedule for a key gets to run
            let current = pending
                .remove_if(&key, |_, latest| latest.generation == generation)
                .is_some();
            if current {
                trace!(?key, "Debounce fired");
                task().await;
            }
        });
    }

    /// Drop the pending task for `key`, returning whether one existed
    pub fn cancel(&self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Drop every pending task and return their keys
    ///
    /// Used to run the deferred work immediately instead of waiting.
    pub fn take_pending(&self) -> Vec<K> {
        let keys: Vec<K> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        keys.into_iter()
            .filter(|key| self.pending.remove(key).is_some())
            .collect()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
