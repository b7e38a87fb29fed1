//! Process-wide table of live threads.
//!
//! Every thread touched by this crate gets a small numeric managed id:
//! forked workers receive one when `fork` schedules them, and foreign
//! threads (the main thread, or threads spawned outside this crate) are
//! registered lazily the first time they interact with a lock or ask for
//! their identity. The id is what lock ownership checks and diagnostics
//! are phrased in terms of, so it must never be zero for a live thread;
//! zero is reserved to mean "unbound" / "unlocked".

use parking_lot::Mutex;
use std::{
    cell::Cell,
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock,
    },
    thread::ThreadId,
};

use crate::tracer::tracer;

thread_local! {
    /// Cached managed thread ID for the current thread
    static CURRENT_THREAD_ID: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Lifecycle state of a registered thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// `fork` has handed the entry point to the OS but it has not run yet
    Scheduled,
    /// Thread entry point is executing
    Running,
    /// Entry point has returned (record is removed right after)
    Exited,
}

/// Bookkeeping for one registered thread.
#[derive(Debug)]
struct ThreadRecord {
    /// Managed id, stable for the thread's whole lifetime
    managed_id: u64,
    /// Native OS thread ID, known once the entry point runs
    native_id: OnceLock<ThreadId>,
    /// Current state, encoded for atomic access
    state: AtomicU64,
}

impl ThreadRecord {
    fn new(managed_id: u64, state: ThreadState) -> Self {
        Self {
            managed_id,
            native_id: OnceLock::new(),
            state: AtomicU64::new(state as u64),
        }
    }

    fn get_state(&self) -> ThreadState {
        match self.state.load(Ordering::Acquire) {
            0 => ThreadState::Scheduled,
            1 => ThreadState::Running,
            _ => ThreadState::Exited,
        }
    }

    fn set_state(&self, state: ThreadState) {
        self.state.store(state as u64, Ordering::Release);
    }
}

/// Registry of every live thread known to this crate.
///
/// Shared state is a single map guarded by a `parking_lot` mutex plus an
/// atomic id counter; per-thread lookups go through a thread-local cache
/// first, so the map is only touched on registration, exit, and the
/// first identity query of a foreign thread.
pub struct ThreadRegistry {
    /// Map from managed thread ID to thread info
    threads: Mutex<HashMap<u64, Arc<ThreadRecord>>>,
    /// Counter for allocating managed thread IDs
    next_thread_id: AtomicU64,
}

static REGISTRY: OnceLock<ThreadRegistry> = OnceLock::new();

impl ThreadRegistry {
    fn new() -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            next_thread_id: AtomicU64::new(1), // Thread ID 0 is reserved
        }
    }

    /// The process-global registry.
    pub fn global() -> &'static ThreadRegistry {
        REGISTRY.get_or_init(ThreadRegistry::new)
    }

    /// Reserve an id and record a thread that has been handed to the OS
    /// but has not started running. Called by `fork` before spawning.
    pub(crate) fn allocate(&self) -> u64 {
        let managed_id = self.next_thread_id.fetch_add(1, Ordering::SeqCst);
        let record = Arc::new(ThreadRecord::new(managed_id, ThreadState::Scheduled));
        self.threads.lock().insert(managed_id, record);
        managed_id
    }

    /// Remove a record allocated by `allocate` when the native spawn
    /// itself failed, so a refused fork leaves no residue.
    pub(crate) fn discard(&self, managed_id: u64) {
        self.threads.lock().remove(&managed_id);
    }

    /// Bind the calling thread to a previously allocated id. Runs first
    /// thing inside the new thread's entry point.
    pub(crate) fn attach(&self, managed_id: u64) {
        let record = self.threads.lock().get(&managed_id).cloned();
        if let Some(record) = record {
            let _ = record.native_id.set(std::thread::current().id());
            record.set_state(ThreadState::Running);
        }

        // Cache the managed ID in thread-local storage
        CURRENT_THREAD_ID.set(Some(managed_id));
    }

    /// Retire the calling thread's record. Runs when the entry point
    /// returns, including by panic.
    pub(crate) fn detach(&self, managed_id: u64) {
        let mut threads = self.threads.lock();
        if let Some(record) = threads.get(&managed_id) {
            record.set_state(ThreadState::Exited);
        }
        threads.remove(&managed_id);
        drop(threads);

        // Clear thread-local cache
        CURRENT_THREAD_ID.set(None);
    }

    /// Get the calling thread's managed id, registering it on the spot
    /// if this crate has never seen it before.
    pub fn current_id(&self) -> u64 {
        // Fast path: thread-local cache
        if let Some(id) = CURRENT_THREAD_ID.get() {
            return id;
        }

        // Slow path: the thread may have been registered by another
        // handle to it (cache lost is impossible, but keep the lookup
        // symmetric with registration by native id)
        let native_id = std::thread::current().id();
        let found = {
            let threads = self.threads.lock();
            threads
                .values()
                .find(|t| t.native_id.get() == Some(&native_id))
                .map(|t| t.managed_id)
        };
        if let Some(id) = found {
            CURRENT_THREAD_ID.set(Some(id));
            return id;
        }

        // Foreign thread: register it lazily so it has a usable identity
        let managed_id = self.next_thread_id.fetch_add(1, Ordering::SeqCst);
        let record = Arc::new(ThreadRecord::new(managed_id, ThreadState::Running));
        let _ = record.native_id.set(native_id);
        self.threads.lock().insert(managed_id, record);
        CURRENT_THREAD_ID.set(Some(managed_id));

        if tracer().is_enabled() {
            let current = std::thread::current();
            tracer().trace_thread_create(managed_id, current.name().unwrap_or("foreign"));
        }

        managed_id
    }

    /// State of a registered thread, `None` once it has been retired.
    pub fn state_of(&self, managed_id: u64) -> Option<ThreadState> {
        self.threads.lock().get(&managed_id).map(|t| t.get_state())
    }

    /// Number of currently registered threads.
    pub fn thread_count(&self) -> usize {
        self.threads.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn allocate_attach_detach_roundtrip() {
        let registry = ThreadRegistry::global();

        let id = registry.allocate();
        assert!(id > 0);
        assert_eq!(registry.state_of(id), Some(ThreadState::Scheduled));
        assert!(registry.thread_count() >= 1);

        let handle = thread::spawn(move || {
            let registry = ThreadRegistry::global();
            registry.attach(id);
            assert_eq!(registry.current_id(), id);
            assert_eq!(registry.state_of(id), Some(ThreadState::Running));
            registry.detach(id);
        });
        handle.join().unwrap();

        assert_eq!(registry.state_of(id), None);
    }

    #[test]
    fn discard_removes_unstarted_record() {
        let registry = ThreadRegistry::global();
        let id = registry.allocate();
        registry.discard(id);
        assert_eq!(registry.state_of(id), None);
    }

    #[test]
    fn foreign_thread_gets_stable_id() {
        let registry = ThreadRegistry::global();
        let first = registry.current_id();
        let second = registry.current_id();
        assert!(first > 0);
        assert_eq!(first, second);
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let registry = ThreadRegistry::global();
        let mine = registry.current_id();

        let theirs = thread::spawn(|| ThreadRegistry::global().current_id())
            .join()
            .unwrap();

        assert_ne!(mine, theirs);
    }
}
