//! Error types surfaced by fallible operations.
//!
//! Only resource exhaustion is recoverable here: the OS can refuse to
//! create another native thread, and `fork` reports that to the caller.
//! Usage violations (joining an unbound handle, re-entering a held lock,
//! waiting without holding) are programming errors and panic instead.

use thiserror::Error;

/// Errors produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The operating system refused to start a new native thread,
    /// typically because a thread or memory limit was reached.
    #[error("native thread creation failed: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Convenience alias used by all fallible public functions.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_error_display_includes_os_cause() {
        let os = std::io::Error::new(std::io::ErrorKind::WouldBlock, "Resource temporarily unavailable");
        let err = Error::from(os);
        let msg = err.to_string();
        assert!(msg.starts_with("native thread creation failed"));
        assert!(msg.contains("Resource temporarily unavailable"));
    }
}
