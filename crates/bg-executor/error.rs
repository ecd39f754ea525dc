use exec_os::OsError;

/// Failure kinds surfaced across the background executor's API (spec §7).
///
/// `Timeout` is deliberately absent: spec.md §7 says it "is never surfaced" -
/// it stays an internal classification of `Condvar::wait_until`'s return
/// inside the driver loop, not a variant a caller can ever observe.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A store was at capacity; the future that could not be (re-)enqueued
    /// was destroyed before this error was returned.
    #[error("task store at capacity")]
    OutOfMemory,
    /// The background executor has already been torn down.
    #[error("background executor is not running")]
    InvalidState,
    /// The OS facade reported a failure (mutex/condvar/thread).
    #[error(transparent)]
    System(#[from] OsError),
}
