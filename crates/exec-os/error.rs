/// Failures surfaced by the OS facade itself (spec §7's `SystemError`
/// kind). These always propagate to the caller; the executor never retries
/// an OS facade call on its own.
#[derive(Debug, thiserror::Error)]
pub enum OsError {
    #[error("failed to spawn an operating system thread")]
    ThreadSpawnFailed,
    #[error("failed to join an operating system thread")]
    ThreadJoinFailed,
    #[error("mutex or condition variable reported a failure")]
    SyncPrimitiveFailed,
}
