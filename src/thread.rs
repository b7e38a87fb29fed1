//! Thread handles and lifecycle operations.
//!
//! `fork` starts a native thread and hands back a [`Thread`] handle;
//! [`join`] consumes the handle and blocks until the worker finishes,
//! returning whatever the worker produced. Handles are plain values: a
//! default-constructed one is inactive and refuses to be joined, and
//! because `join` takes the handle by value a bound handle can only be
//! joined once.
//!
//! Visibility guarantees follow the native platform: everything written
//! by the parent before `fork` is visible to the worker, and everything
//! written by the worker is visible to the parent after `join` returns.

use std::{
    fmt,
    panic::resume_unwind,
    thread::{Builder, JoinHandle},
};

use crate::{
    error::{Error, Result},
    metrics::metrics,
    registry::ThreadRegistry,
    tracer::tracer,
};

/// Handle to a concurrent unit of execution.
///
/// `T` is the worker's result type; plain fire-and-forget workers leave
/// it at the `()` default. The handle identifies the thread (see
/// [`Thread::id`] and the `Display` impl) and, if it came from [`fork`],
/// carries the right to join it.
pub struct Thread<T = ()> {
    id: u64,
    handle: Option<JoinHandle<T>>,
}

impl<T> Thread<T> {
    /// An inactive handle: bound to nothing, joining it panics.
    pub fn inactive() -> Self {
        Self {
            id: 0,
            handle: None,
        }
    }

    /// Managed id of the thread this handle refers to (0 when inactive).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this handle is bound to a thread at all. An
    /// identification-only handle from [`current`] is active but still
    /// not joinable.
    pub fn is_active(&self) -> bool {
        self.id != 0
    }

    /// Block until the thread finishes and return its result.
    ///
    /// A panic in the worker is re-raised here. Joining an inactive
    /// handle, or an identification-only handle such as the one
    /// [`current`] returns, is a usage error and panics with a
    /// diagnostic.
    pub fn join(mut self) -> T {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None if self.id == 0 => panic!("cannot join an inactive thread handle"),
            None => panic!("{self} carries no join handle (self-join or identification-only handle)"),
        };

        let outcome = handle.join();
        metrics().record_join();
        tracer().trace_thread_join(self.id);

        match outcome {
            Ok(value) => value,
            Err(payload) => resume_unwind(payload),
        }
    }
}

impl<T> Default for Thread<T> {
    fn default() -> Self {
        Self::inactive()
    }
}

impl<T> fmt::Display for Thread<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id == 0 {
            write!(f, "thread (inactive)")
        } else {
            write!(f, "thread-{}", self.id)
        }
    }
}

impl<T> fmt::Debug for Thread<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("joinable", &self.handle.is_some())
            .finish()
    }
}

/// Handles compare by thread identity, not by join capability.
impl<T> PartialEq for Thread<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Thread<T> {}

/// Packages a worker and its managed id into the closure the native
/// spawn call runs: registry attach, start/exit tracing, the body, and
/// guaranteed detach even when the body panics.
struct EntryPoint<F> {
    id: u64,
    body: F,
}

/// Keeps the registry honest if the worker body unwinds.
struct Attached(u64);

impl Drop for Attached {
    fn drop(&mut self) {
        tracer().trace_thread_exit(self.0);
        ThreadRegistry::global().detach(self.0);
    }
}

impl<T, F: FnOnce() -> T> EntryPoint<F> {
    fn run(self) -> T {
        ThreadRegistry::global().attach(self.id);
        let _attached = Attached(self.id);
        tracer().trace_thread_start(self.id);
        (self.body)()
    }
}

/// Start a new thread running `f` and return a joinable handle to it.
///
/// By the time this returns, the thread has been scheduled (not
/// necessarily run) and the handle is valid for [`join`]. If the OS
/// refuses to create another thread, the error is returned and no
/// handle is bound.
pub fn fork<T, F>(f: F) -> Result<Thread<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let registry = ThreadRegistry::global();
    let id = registry.allocate();
    let name = format!("gthread-{id}");
    tracer().trace_thread_create(id, &name);

    let entry = EntryPoint { id, body: f };
    match Builder::new().name(name).spawn(move || entry.run()) {
        Ok(handle) => {
            metrics().record_fork();
            Ok(Thread {
                id,
                handle: Some(handle),
            })
        }
        Err(cause) => {
            registry.discard(id);
            Err(Error::Spawn(cause))
        }
    }
}

/// One-argument form of [`fork`]: the worker gets exclusive access to
/// `data`, and `join` hands the (possibly mutated) data back to the
/// caller alongside the worker's result.
///
/// Moving `data` into the worker and back out through `join` is what
/// makes the handoff race-free: the parent cannot touch the data while
/// the worker runs, and the worker's writes are visible after `join`.
pub fn fork_with<A, T, F>(f: F, mut data: A) -> Result<Thread<(A, T)>>
where
    F: FnOnce(&mut A) -> T + Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    fork(move || {
        let result = f(&mut data);
        (data, result)
    })
}

/// Block until `thread` finishes; see [`Thread::join`].
pub fn join<T>(thread: Thread<T>) -> T {
    thread.join()
}

/// Hint the scheduler to run another ready thread. No ordering or
/// fairness guarantee.
pub fn yield_now() {
    if tracer().is_enabled() {
        tracer().trace_thread_yield(ThreadRegistry::global().current_id());
    }
    std::thread::yield_now();
}

/// An identification-only handle for the calling thread, usable for
/// comparison and diagnostics. It is never joinable; a thread cannot
/// reap itself.
pub fn current() -> Thread {
    Thread {
        id: ThreadRegistry::global().current_id(),
        handle: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    #[test]
    fn fork_join_returns_worker_result() {
        let t = fork(|| 6 * 7).unwrap();
        assert_eq!(join(t), 42);
    }

    #[test]
    fn join_observes_worker_writes() {
        let cell = Arc::new(AtomicU64::new(0));
        let cell2 = cell.clone();
        let t = fork(move || {
            cell2.store(1234, Ordering::Relaxed);
        })
        .unwrap();
        join(t);
        assert_eq!(cell.load(Ordering::Relaxed), 1234);
    }

    #[test]
    fn fork_with_passes_argument_both_ways() {
        let t = fork_with(
            |n: &mut i32| {
                assert_eq!(*n, 42);
                *n = 99;
                "done"
            },
            42,
        )
        .unwrap();
        let (data, result) = join(t);
        assert_eq!(data, 99);
        assert_eq!(result, "done");
    }

    #[test]
    fn current_is_stable_and_distinct_from_workers() {
        let me = current();
        assert!(me.is_active());
        assert_eq!(me, current());

        let worker_view = join(fork(current).unwrap());
        assert_ne!(me, worker_view);
    }

    #[test]
    #[should_panic(expected = "inactive thread handle")]
    fn joining_inactive_handle_panics() {
        let t: Thread = Thread::default();
        t.join();
    }

    #[test]
    #[should_panic(expected = "no join handle")]
    fn joining_identification_handle_panics() {
        current().join();
    }

    #[test]
    fn worker_panic_propagates_to_joiner() {
        let t = fork(|| panic!("worker failure")).unwrap();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || join(t)));
        assert!(outcome.is_err());
    }

    #[test]
    fn display_labels() {
        assert_eq!(Thread::<()>::inactive().to_string(), "thread (inactive)");
        let t = fork(|| ()).unwrap();
        assert!(t.to_string().starts_with("thread-"));
        join(t);
    }

    #[test]
    fn yield_now_is_callable() {
        // Only a scheduling hint; just make sure it does not disturb state.
        let before = current();
        yield_now();
        assert_eq!(before, current());
    }
}
