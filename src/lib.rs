//! Thread and monitor-lock primitives behind compact value handles.
//!
//! This crate is the concurrency core used by host runtimes that need to
//! run workers off the main thread and guard the shared state those
//! workers touch. It deliberately exposes a small surface:
//!
//! - [`fork`] / [`fork_with`] start a worker and return a [`Thread`]
//!   handle; [`join`] consumes the handle and waits for completion;
//!   [`yield_now`] hints the scheduler; [`current`] identifies the
//!   calling thread.
//! - [`Lock`] provides mutual exclusion plus monitor-style
//!   [`wait`](Lock::wait)/[`signal`](Lock::signal) rendezvous.
//! - [`synchronized!`] runs a block as a critical section with
//!   guaranteed release on every exit path.
//!
//! It is not a thread pool, scheduler, or actor framework: no
//! cancellation, no priorities, no timed waits.
//!
//! ```
//! use std::sync::{atomic::{AtomicU64, Ordering}, Arc};
//! use gthread::{fork, join, synchronized, Lock};
//!
//! let lock = Arc::new(Lock::new());
//! let counter = Arc::new(AtomicU64::new(0));
//!
//! let mut workers = Vec::new();
//! for _ in 0..4 {
//!     let lock = Arc::clone(&lock);
//!     let counter = Arc::clone(&counter);
//!     workers.push(fork(move || {
//!         for _ in 0..100 {
//!             synchronized!(lock => {
//!                 let seen = counter.load(Ordering::Relaxed);
//!                 counter.store(seen + 1, Ordering::Relaxed);
//!             });
//!         }
//!     }).unwrap());
//! }
//! for worker in workers {
//!     join(worker);
//! }
//! assert_eq!(counter.load(Ordering::Relaxed), 400);
//! ```
//!
//! Set `GTHREAD_TRACE=stderr` (or a file path) to get a timeline of
//! thread and lock events; see [`tracer`] for the full set of knobs.

#[macro_use]
mod macros;

pub mod error;
pub mod lock;
pub mod metrics;
pub mod registry;
pub mod thread;
pub mod tracer;

pub use error::{Error, Result};
pub use lock::{Lock, SectionGuard};
pub use metrics::{metrics, RuntimeMetrics};
pub use registry::ThreadRegistry;
pub use thread::{current, fork, fork_with, join, yield_now, Thread};
pub use tracer::{tracer, Tracer};
