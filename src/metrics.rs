use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Process-wide counters for thread and lock activity.
///
/// All fields are plain atomics so recording is wait-free and safe from
/// any thread. Counters only ever increase; consumers compute deltas.
#[derive(Debug)]
pub struct RuntimeMetrics {
    /// Number of threads started via `fork`
    pub threads_forked: AtomicU64,
    /// Number of threads reaped via `join`
    pub threads_joined: AtomicU64,
    /// Number of times a thread had to block waiting for a lock
    pub lock_contention_count: AtomicU64,
    /// Total time spent waiting for locks (in microseconds)
    pub lock_contention_total_us: AtomicU64,
    /// Number of condition waits entered
    pub condition_waits: AtomicU64,
    /// Number of signals issued
    pub condition_signals: AtomicU64,
}

impl RuntimeMetrics {
    pub const fn new() -> Self {
        Self {
            threads_forked: AtomicU64::new(0),
            threads_joined: AtomicU64::new(0),
            lock_contention_count: AtomicU64::new(0),
            lock_contention_total_us: AtomicU64::new(0),
            condition_waits: AtomicU64::new(0),
            condition_signals: AtomicU64::new(0),
        }
    }

    pub fn record_fork(&self) {
        self.threads_forked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_join(&self) {
        self.threads_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_contention(&self, duration: Duration) {
        self.lock_contention_count.fetch_add(1, Ordering::Relaxed);
        self.lock_contention_total_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_wait(&self) {
        self.condition_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signal(&self) {
        self.condition_signals.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for RuntimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: RuntimeMetrics = RuntimeMetrics::new();

/// The process-global metrics instance.
pub fn metrics() -> &'static RuntimeMetrics {
    &METRICS
}
