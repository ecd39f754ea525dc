use crate::executor::{Executor, DEFAULT_CAPACITY};
use crate::handle::FutureHandle;
use alloc::boxed::Box;
use exec_os::{Clock, Instant};

/// Outcome of a single call into a future's step function.
///
/// spec.md pairs `ready: bool` with a `has_wake_up_time: bool` /
/// `wake_up_time: Instant` pair; `Option<Instant>` is the same information
/// with the "is this value meaningful" question answered by the type rather
/// than a second field that callers must remember to check.
pub struct StepResult {
    pub(crate) ready: bool,
    pub(crate) wake_up_time: Option<Instant>,
}

impl StepResult {
    /// The future has finished; it moves to `Ready` and is dropped.
    pub fn ready() -> Self {
        Self {
            ready: true,
            wake_up_time: None,
        }
    }

    /// Not finished; re-enqueue at the back of the FIFO for the next spin.
    pub fn pending() -> Self {
        Self {
            ready: false,
            wake_up_time: None,
        }
    }

    /// Not finished; re-enqueue into the timed store, eligible to run again
    /// once the clock reaches `wake_up_time`.
    pub fn pending_until(wake_up_time: Instant) -> Self {
        Self {
            ready: false,
            wake_up_time: Some(wake_up_time),
        }
    }
}

type StepFn<C, const N: usize> = Box<dyn FnMut(&mut Executor<C, N>) -> StepResult + Send>;

/// A unit of cooperative work: a boxed step closure plus an optional handle.
///
/// `N` must match the capacity of the [`Executor`] this future is spawned
/// onto - it is part of the step closure's argument type, not a free
/// parameter, so a future built for one executor's capacity cannot be
/// spawned onto a differently-sized one. Dropping a `Future` drops its
/// captured state (and, transitively, any resources the closure owns)
/// exactly once - this is the Rust-idiomatic replacement for an explicit
/// destructor callback.
pub struct Future<C, const N: usize = DEFAULT_CAPACITY> {
    pub(crate) step: StepFn<C, N>,
    pub(crate) handle: Option<FutureHandle>,
}

impl<C, const N: usize> Future<C, N> {
    /// Builds a future from its step closure. No handle exists until
    /// [`get_handle`](Self::get_handle) is called.
    pub fn new(step: impl FnMut(&mut Executor<C, N>) -> StepResult + Send + 'static) -> Self {
        Self {
            step: Box::new(step),
            handle: None,
        }
    }

    /// Returns a handle to observe/cancel this future, allocating one on
    /// first call and cloning the same one on every call after.
    pub fn get_handle(&mut self) -> FutureHandle {
        match &self.handle {
            Some(handle) => handle.clone(),
            None => {
                let handle = FutureHandle::new();
                self.handle = Some(handle.clone());
                handle
            }
        }
    }
}

/// A future parked in the timed store, ordered by `wake_up_time_ms` (spec.md
/// §4.3/§4.5: the min-heap's comparator keys on this field alone).
pub(crate) struct TimedFuture<C, const N: usize> {
    pub(crate) future: Future<C, N>,
    pub(crate) wake_up_time_ms: u64,
}

pub(crate) fn cmp_by_wake_time<C, const N: usize>(
    a: &TimedFuture<C, N>,
    b: &TimedFuture<C, N>,
) -> core::cmp::Ordering {
    a.wake_up_time_ms.cmp(&b.wake_up_time_ms)
}

pub(crate) fn to_wake_up_time_ms<C: Clock>(clock: &C, epoch: Instant, instant: Instant) -> u64 {
    clock.elapsed_ms_since(epoch, instant)
}
