//! IO-optimized diagnostics tracer for thread and lock activity.
//!
//! Captures thread lifecycle and lock events with minimal overhead
//! through buffering and early-exit checks when disabled.
//!
//! ## Environment Variables
//!
//! - `GTHREAD_TRACE`: Enable tracing
//!   - `"1"`, `"true"`, or `"stdout"`: Write to stdout
//!   - `"stderr"`: Write to stderr
//!   - `<path>`: Write to file at path
//!
//! - `GTHREAD_TRACE_FLUSH_INTERVAL`: Number of messages before auto-flush (default: 10000)
//!
//! - `GTHREAD_TRACE_STATS`: Enable statistics collection (`"1"` or `"true"`)
//!
//! ## Performance Characteristics
//!
//! - 256KB write buffer to minimize syscalls
//! - Automatic periodic flushing to prevent buffer overflow
//! - Early-exit checks when tracing is disabled (zero-cost when off)
//! - Lazy string formatting only when tracing is active
use parking_lot::Mutex;
use std::{
    env,
    fs::File,
    io::{stderr, stdout, BufWriter, Write},
    sync::atomic::{AtomicUsize, Ordering},
    sync::OnceLock,
};

const BUFFER_SIZE: usize = 256 * 1024; // 256KB buffer for better IO performance
const AUTO_FLUSH_INTERVAL: usize = 10_000; // Auto-flush every N messages

/// Statistics for trace activity
#[derive(Debug, Clone, Default)]
pub struct TraceStats {
    pub total_messages: usize,
    pub thread_events: usize,
    pub lock_events: usize,
}

/// A buffered event tracer shared by every thread in the process.
///
/// Unlike a per-component tracer, this one is reached through a global
/// accessor and may be written from several threads at once, so the
/// writer and statistics sit behind mutexes rather than cells.
pub struct Tracer {
    enabled: bool,
    writer: Mutex<Option<BufWriter<Box<dyn Write + Send>>>>,
    message_count: AtomicUsize,
    auto_flush_interval: usize,
    stats: Mutex<TraceStats>,
    detailed_stats: bool,
}

impl Tracer {
    /// Build a tracer from the `GTHREAD_TRACE` environment variables.
    pub fn from_env() -> Self {
        let trace_env = env::var("GTHREAD_TRACE");
        let (enabled, writer): (bool, Option<Box<dyn Write + Send>>) = match trace_env {
            Ok(val) if val == "1" || val == "true" || val == "stdout" => {
                (true, Some(Box::new(stdout())))
            }
            Ok(val) if val == "stderr" => (true, Some(Box::new(stderr()))),
            Ok(val) if !val.is_empty() => {
                // assume it's a file path
                match File::create(&val) {
                    Ok(f) => (true, Some(Box::new(f))),
                    Err(e) => {
                        eprintln!("Failed to create trace file {}: {}", val, e);
                        (false, None)
                    }
                }
            }
            _ => (false, None),
        };

        let auto_flush_interval = env::var("GTHREAD_TRACE_FLUSH_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(AUTO_FLUSH_INTERVAL);

        let detailed_stats = env::var("GTHREAD_TRACE_STATS")
            .map(|v| v == "1" || v == "true")
            .unwrap_or(false);

        Self::build(enabled, writer, auto_flush_interval, detailed_stats)
    }

    fn build(
        enabled: bool,
        writer: Option<Box<dyn Write + Send>>,
        auto_flush_interval: usize,
        detailed_stats: bool,
    ) -> Self {
        Self {
            enabled,
            writer: Mutex::new(writer.map(|w| BufWriter::with_capacity(BUFFER_SIZE, w))),
            message_count: AtomicUsize::new(0),
            auto_flush_interval,
            stats: Mutex::new(TraceStats::default()),
            detailed_stats,
        }
    }

    #[inline(always)]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn write_msg(&self, args: std::fmt::Arguments) {
        if let Some(ref mut writer) = *self.writer.lock() {
            let _ = writer.write_fmt(args);
            let _ = writer.write_all(b"\n");

            // Periodic auto-flush to prevent buffer overflow and ensure visibility
            let count = self.message_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count >= self.auto_flush_interval {
                let _ = writer.flush();
                self.message_count.store(0, Ordering::Relaxed);
            }
        }
    }

    fn count_thread_event(&self) {
        if self.detailed_stats {
            let mut stats = self.stats.lock();
            stats.total_messages += 1;
            stats.thread_events += 1;
        }
    }

    fn count_lock_event(&self) {
        if self.detailed_stats {
            let mut stats = self.stats.lock();
            stats.total_messages += 1;
            stats.lock_events += 1;
        }
    }

    pub fn flush(&self) {
        if self.enabled {
            if let Some(ref mut writer) = *self.writer.lock() {
                let _ = writer.flush();
            }
            self.message_count.store(0, Ordering::Relaxed);
        }
    }

    /// Snapshot of collected statistics (empty unless `GTHREAD_TRACE_STATS` is set).
    pub fn stats(&self) -> TraceStats {
        self.stats.lock().clone()
    }

    // === Thread lifecycle events ===

    pub fn trace_thread_create(&self, thread_id: u64, name: &str) {
        if !self.enabled {
            return;
        }
        self.count_thread_event();
        self.write_msg(format_args!(
            "THREAD CREATE [ID:{}] \"{}\"",
            thread_id, name
        ));
    }

    pub fn trace_thread_start(&self, thread_id: u64) {
        if !self.enabled {
            return;
        }
        self.count_thread_event();
        self.write_msg(format_args!("THREAD START  [ID:{}]", thread_id));
    }

    pub fn trace_thread_exit(&self, thread_id: u64) {
        if !self.enabled {
            return;
        }
        self.count_thread_event();
        self.write_msg(format_args!("THREAD EXIT   [ID:{}]", thread_id));
    }

    pub fn trace_thread_join(&self, thread_id: u64) {
        if !self.enabled {
            return;
        }
        self.count_thread_event();
        self.write_msg(format_args!("THREAD JOIN   [ID:{}]", thread_id));
    }

    pub fn trace_thread_yield(&self, thread_id: u64) {
        if !self.enabled {
            return;
        }
        self.count_thread_event();
        self.write_msg(format_args!("THREAD YIELD  [ID:{}]", thread_id));
    }

    // === Lock events ===

    pub fn trace_lock_contended(&self, lock_label: u64, thread_id: u64, waited_us: u64) {
        if !self.enabled {
            return;
        }
        self.count_lock_event();
        self.write_msg(format_args!(
            "LOCK ENTER    [L:{}] thread-{} blocked {}us",
            lock_label, thread_id, waited_us
        ));
    }

    pub fn trace_lock_wait(&self, lock_label: u64, thread_id: u64) {
        if !self.enabled {
            return;
        }
        self.count_lock_event();
        self.write_msg(format_args!(
            "LOCK WAIT     [L:{}] thread-{}",
            lock_label, thread_id
        ));
    }

    pub fn trace_lock_signal(&self, lock_label: u64, thread_id: u64, waiters: usize) {
        if !self.enabled {
            return;
        }
        self.count_lock_event();
        self.write_msg(format_args!(
            "LOCK SIGNAL   [L:{}] thread-{} waking {} waiter(s)",
            lock_label, thread_id, waiters
        ));
    }
}

static TRACER: OnceLock<Tracer> = OnceLock::new();

/// The process-global tracer, initialized from the environment on first use.
pub fn tracer() -> &'static Tracer {
    TRACER.get_or_init(Tracer::from_env)
}
