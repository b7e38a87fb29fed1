/// Run a block as a scoped critical section over a [`Lock`](crate::Lock).
///
/// Enters the lock, runs the body exactly once, and releases on every
/// exit path: normal fallthrough, `return`/`break`/`continue` out of
/// the body, or a panic unwinding through it. Release is carried by the
/// drop of the underlying [`SectionGuard`](crate::SectionGuard), not by
/// code at the end of the body.
///
/// ```
/// use gthread::{synchronized, Lock};
///
/// let lock = Lock::new();
/// let mut hits = 0;
/// synchronized!(lock => {
///     hits += 1;
/// });
/// assert_eq!(hits, 1);
/// ```
#[macro_export]
macro_rules! synchronized {
    ($lock:expr => $body:block) => {{
        let _section = $lock.enter();
        $body
    }};
}
