//! Mutual exclusion with monitor-style wait/signal.
//!
//! A [`Lock`] couples one mutex with one condition rendezvous. Mutual
//! exclusion is entered through [`Lock::enter`], which returns an RAII
//! [`SectionGuard`]; the [`synchronized!`](crate::synchronized) macro
//! wraps that into a block form. While inside the section, the owning
//! thread may call [`Lock::wait`] (atomically release, block until
//! signaled, re-acquire) and [`Lock::signal`] (wake every current
//! waiter).
//!
//! Ownership is tracked by managed thread id, so holding the lock is a
//! runtime-checkable fact: `wait` and `signal` from a non-owner, and
//! re-entering from the owner, panic instead of deadlocking or
//! corrupting state. The lock is deliberately not reentrant.

use parking_lot::{Condvar, Mutex};
use std::{
    fmt,
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use crate::{metrics::metrics, registry::ThreadRegistry, tracer::tracer};

/// Labels for trace output; nothing else keys off them.
static NEXT_LOCK_LABEL: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct LockState {
    /// Managed id of the current owner (0 means unlocked)
    owner: u64,
    /// Bumped by every `signal`; a wait returns once it moves
    epoch: u64,
    /// Threads currently blocked in `wait`
    waiters: usize,
}

/// A mutual-exclusion lock with condition-wait semantics.
///
/// Constructed unlocked; never copied or cloned, so two handles can
/// never alias distinct native primitives. Share it across threads with
/// an `Arc`.
///
/// The data it protects lives outside the lock; callers must only touch
/// that data between [`enter`](Lock::enter) and the guard's drop. A
/// woken waiter must still re-check its predicate in a loop, because a
/// broadcast can wake waiters whose condition another thread already
/// consumed.
pub struct Lock {
    label: u64,
    state: Mutex<LockState>,
    /// Signaled whenever the lock is released
    available: Condvar,
    /// Signaled by `signal` to wake waiters
    signaled: Condvar,
}

impl Lock {
    /// A fresh, unlocked lock.
    pub fn new() -> Self {
        Self {
            label: NEXT_LOCK_LABEL.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(LockState {
                owner: 0,
                epoch: 0,
                waiters: 0,
            }),
            available: Condvar::new(),
            signaled: Condvar::new(),
        }
    }

    /// Enter the critical section, blocking until the lock is free.
    ///
    /// The returned guard releases the lock when dropped, on every exit
    /// path. Panics if the calling thread already holds the lock.
    pub fn enter(&self) -> SectionGuard<'_> {
        let me = ThreadRegistry::global().current_id();
        let mut state = self.state.lock();

        if state.owner == me {
            panic!("lock L:{} is not reentrant: thread-{} already holds it", self.label, me);
        }

        if state.owner != 0 {
            let start = Instant::now();
            while state.owner != 0 {
                self.available.wait(&mut state);
            }
            let waited = start.elapsed();
            metrics().record_lock_contention(waited);
            tracer().trace_lock_contended(self.label, me, waited.as_micros() as u64);
        }

        state.owner = me;
        SectionGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Enter the critical section if the lock is free right now.
    ///
    /// Panics if the calling thread already holds the lock, same as
    /// [`enter`](Lock::enter).
    pub fn try_enter(&self) -> Option<SectionGuard<'_>> {
        let me = ThreadRegistry::global().current_id();
        let mut state = self.state.lock();

        if state.owner == me {
            panic!("lock L:{} is not reentrant: thread-{} already holds it", self.label, me);
        }
        if state.owner != 0 {
            return None;
        }

        state.owner = me;
        Some(SectionGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// Atomically release the lock and block until another thread calls
    /// [`signal`](Lock::signal); re-acquires the lock before returning.
    ///
    /// Must be called while holding the lock (panics otherwise). Only
    /// signals issued while blocked here count; the caller should still
    /// loop on its own predicate.
    pub fn wait(&self) {
        let me = ThreadRegistry::global().current_id();
        let mut state = self.state.lock();

        if state.owner != me {
            panic!(
                "wait() on lock L:{} requires holding it (thread-{}, owner is {})",
                self.label, me, Owner(state.owner)
            );
        }

        metrics().record_wait();
        tracer().trace_lock_wait(self.label, me);

        // Release and let contenders in before suspending.
        let baseline = state.epoch;
        state.owner = 0;
        state.waiters += 1;
        self.available.notify_one();

        while state.epoch == baseline {
            self.signaled.wait(&mut state);
        }
        state.waiters -= 1;

        // Re-contend for the lock before returning to the caller.
        while state.owner != 0 {
            self.available.wait(&mut state);
        }
        state.owner = me;
    }

    /// Wake every thread currently blocked in [`wait`](Lock::wait) on
    /// this lock. Woken threads re-acquire the lock one at a time
    /// before their `wait` returns. Does not block and does not release
    /// the lock.
    ///
    /// Must be called while holding the lock (panics otherwise).
    pub fn signal(&self) {
        let me = ThreadRegistry::global().current_id();
        let mut state = self.state.lock();

        if state.owner != me {
            panic!(
                "signal() on lock L:{} requires holding it (thread-{}, owner is {})",
                self.label, me, Owner(state.owner)
            );
        }

        metrics().record_signal();
        tracer().trace_lock_signal(self.label, me, state.waiters);

        state.epoch = state.epoch.wrapping_add(1);
        self.signaled.notify_all();
    }

    /// Release, called from the guard's drop.
    fn exit(&self) {
        let mut state = self.state.lock();
        debug_assert_ne!(state.owner, 0, "section guard dropped on an unlocked lock");
        state.owner = 0;
        self.available.notify_one();
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_lock() {
            Some(state) => f
                .debug_struct("Lock")
                .field("label", &self.label)
                .field("owner", &state.owner)
                .field("waiters", &state.waiters)
                .finish(),
            None => f
                .debug_struct("Lock")
                .field("label", &self.label)
                .finish_non_exhaustive(),
        }
    }
}

/// Formats an owner id, with 0 rendered as "unlocked".
struct Owner(u64);

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            write!(f, "unlocked")
        } else {
            write!(f, "thread-{}", self.0)
        }
    }
}

/// RAII guard for one critical section over a [`Lock`].
///
/// Dropping the guard releases the lock, whether the section body fell
/// through, returned early, or panicked. The guard is `!Send`, so the
/// release always happens on the thread that entered.
#[must_use = "the critical section ends as soon as the guard is dropped"]
pub struct SectionGuard<'a> {
    lock: &'a Lock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for SectionGuard<'_> {
    fn drop(&mut self) {
        self.lock.exit();
    }
}
