use atomic_cell::{AtomicUsizeCell, Ordering};
use alloc::sync::Arc;

/// A future's lifecycle state (spec §3/§6). Discriminants are literal so a
/// caller comparing against the raw integer (e.g. across an FFI boundary)
/// gets the same values the original collections do.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending = 0,
    Ready = 1,
    Cancelled = 2,
    Executing = 3,
}

impl Status {
    fn from_usize(value: usize) -> Self {
        match value {
            0 => Status::Pending,
            1 => Status::Ready,
            2 => Status::Cancelled,
            3 => Status::Executing,
            other => unreachable!("future status cell holds out-of-range value {other}"),
        }
    }
}

/// Refcounted, atomic observer of a future's status.
///
/// Cloning a handle shares the same underlying cell; dropping every clone
/// held by the caller does not cancel the future it observes - the executor
/// owns the future's lifetime, `FutureHandle` only watches it.
#[derive(Clone)]
pub struct FutureHandle(Arc<AtomicUsizeCell>);

impl FutureHandle {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicUsizeCell::new(Status::Pending as usize)))
    }

    /// Current lifecycle state.
    pub fn status(&self) -> Status {
        Status::from_usize(self.0.load(Ordering::Acquire))
    }

    /// Requests cancellation. A no-op once the future has reached `Ready` or
    /// `Cancelled`. A future currently `Executing` is not interrupted - the
    /// request retries until the executor either finishes it (landing on
    /// `Ready`, which makes this a no-op) or re-enqueues it back to
    /// `Pending`, at which point the CAS below lands and the executor drops
    /// it unexecuted on its next pickup attempt.
    pub fn cancel(&self) {
        loop {
            match self.0.compare_exchange(
                Status::Pending as usize,
                Status::Cancelled as usize,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => match Status::from_usize(actual) {
                    Status::Ready | Status::Cancelled => return,
                    Status::Executing => core::hint::spin_loop(),
                    Status::Pending => unreachable!("CAS failure implies a mismatched value"),
                },
            }
        }
    }

    /// Claims the future for execution. Fails only if a concurrent `cancel`
    /// already landed while the future sat `Pending` in a store - the only
    /// other state a queued-but-not-picked-up future can be in.
    pub(crate) fn try_begin_execution(&self) -> bool {
        self.0
            .compare_exchange(
                Status::Pending as usize,
                Status::Executing as usize,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Unconditionally records the outcome of a step. Only ever called by the
    /// executor that currently owns this future (status is `Executing`), so
    /// there is no concurrent writer to race against.
    pub(crate) fn finish(&self, status: Status) {
        debug_assert!(matches!(
            status,
            Status::Ready | Status::Pending | Status::Cancelled
        ));
        self.0.store(status as usize, Ordering::Release);
    }
}

/// Model-checks the cancel-vs-pickup race spec.md §9 calls out ("Cancellation
/// vs. in-flight execution"): a concurrent `cancel` and a concurrent
/// `try_begin_execution` racing the same handle, with loom exploring every
/// legal interleaving of the underlying CAS loop instead of relying on a
/// handful of real-thread runs to happen to hit the interesting orderings.
#[cfg(feature = "loom")]
mod loom_tests {
    use super::*;

    #[test]
    fn cancel_racing_pickup_never_livelocks_and_lands_on_the_right_terminal_state() {
        loom::model(|| {
            let handle = FutureHandle::new();

            let canceller = {
                let handle = handle.clone();
                loom::thread::spawn(move || handle.cancel())
            };

            let executor = {
                let handle = handle.clone();
                loom::thread::spawn(move || {
                    if handle.try_begin_execution() {
                        // Simulates a step that finishes on its first call
                        // (StepResult::ready()) - the only transition out of
                        // Executing that does not hand the race back to
                        // cancel by way of a re-enqueue.
                        handle.finish(Status::Ready);
                        true
                    } else {
                        false
                    }
                })
            };

            canceller.join().unwrap();
            let ran = executor.join().unwrap();

            match handle.status() {
                Status::Ready => assert!(ran, "only the body's own finish() writes Ready"),
                Status::Cancelled => {
                    assert!(!ran, "I3: a landed cancel means the body never ran")
                }
                other => panic!("cancel vs. pickup must settle on a terminal status, got {other:?}"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_handle_starts_pending() {
        let h = FutureHandle::new();
        assert_eq!(h.status(), Status::Pending);
    }

    #[test]
    fn cancel_from_pending_lands_immediately() {
        let h = FutureHandle::new();
        h.cancel();
        assert_eq!(h.status(), Status::Cancelled);
    }

    #[test]
    fn cancel_is_a_no_op_once_ready() {
        let h = FutureHandle::new();
        assert!(h.try_begin_execution());
        h.finish(Status::Ready);
        h.cancel();
        assert_eq!(h.status(), Status::Ready);
    }

    #[test]
    fn cancel_is_a_no_op_once_already_cancelled() {
        let h = FutureHandle::new();
        h.cancel();
        h.cancel();
        assert_eq!(h.status(), Status::Cancelled);
    }

    #[test]
    fn begin_execution_fails_once_cancelled() {
        let h = FutureHandle::new();
        h.cancel();
        assert!(!h.try_begin_execution());
    }

    #[test]
    fn single_cancel_attempt_against_executing_neither_lands_nor_panics() {
        // cancel()'s own loop only terminates once a concurrent executor
        // moves the status off Executing, so this test exercises one
        // iteration of its CAS directly rather than calling the blocking
        // public method from the only thread that could ever unblock it.
        let h = FutureHandle::new();
        assert!(h.try_begin_execution());
        let result = h.0.compare_exchange(
            Status::Pending as usize,
            Status::Cancelled as usize,
            Ordering::Release,
            Ordering::Relaxed,
        );
        assert_eq!(result, Err(Status::Executing as usize));
        assert_eq!(h.status(), Status::Executing);
        h.finish(Status::Pending); // simulates the executor re-enqueueing
        h.cancel(); // now lands immediately, status is back to Pending
        assert_eq!(h.status(), Status::Cancelled);
    }
}
