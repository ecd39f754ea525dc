//! Umbrella crate re-exporting the cooperative task executor core as one
//! public API — the crate an embedder actually depends on, the way the
//! teacher's root `async-nostd` crate gathers its workspace members behind
//! a single surface.
//!
//! Picking a layer:
//! - [`Executor`] alone, driven by hand (`spin()` in your own loop), for a
//!   target with no OS thread to spare.
//! - [`BackgroundExecutor`] wrapping it with a dedicated driver thread, for
//!   everything else.
//!
//! This crate is not `no_std`: [`BackgroundExecutor`] needs a real OS
//! thread, mutex, and condition variable, which [`exec_os`]'s `std`-backed
//! facade provides. Embedders that only need [`Executor`] on a bare target
//! should depend on `task-executor` directly instead of pulling this crate
//! in.

pub use atomic_cell::{fence, AtomicBoolCell, AtomicUsizeCell, Ordering};
pub use bg_executor::{BackgroundExecutor, Error as BackgroundError};
pub use bounded_collections::{BinaryHeap, Deque};
pub use exec_os::{clock::SystemClock, sync, thread, Clock, Instant, Os, OsError, StdOs};
pub use task_executor::{
    Executor, Future, FutureHandle, SpinResult, SpinStatus, StepResult, Status, DEFAULT_CAPACITY,
};

/// Spawns a future with no handle at all — the original `zenoh-pico`
/// collection's `spawn_and_forget` ergonomics (see `DESIGN.md`), folded into
/// the unified executor's plain `spawn` since a handleless `Future` already
/// gets everything that call needed.
pub trait SpawnAndForget<C, const N: usize> {
    fn spawn_and_forget(
        &mut self,
        step: impl FnMut(&mut Executor<C, N>) -> StepResult + Send + 'static,
    ) -> bool;
}

impl<C: Clock, const N: usize> SpawnAndForget<C, N> for Executor<C, N> {
    fn spawn_and_forget(
        &mut self,
        step: impl FnMut(&mut Executor<C, N>) -> StepResult + Send + 'static,
    ) -> bool {
        self.spawn(Future::new(step))
    }
}

/// Same convenience, one layer up: spawn onto a [`BackgroundExecutor`]
/// without ever touching a handle.
pub trait BackgroundSpawnAndForget<O: Os, const N: usize> {
    fn spawn_and_forget(
        &self,
        step: impl FnMut(&mut Executor<O, N>) -> StepResult + Send + 'static,
    ) -> Result<(), BackgroundError>;
}

impl<O: Os, const N: usize> BackgroundSpawnAndForget<O, N> for BackgroundExecutor<O, N> {
    fn spawn_and_forget(
        &self,
        step: impl FnMut(&mut Executor<O, N>) -> StepResult + Send + 'static,
    ) -> Result<(), BackgroundError> {
        self.spawn(Future::new(step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exec_os::clock::ManualClock;

    #[test]
    fn spawn_and_forget_runs_without_ever_allocating_a_handle() {
        let mut exec: Executor<ManualClock, 4> = Executor::new(ManualClock::new());
        assert!(exec.spawn_and_forget(|_| StepResult::ready()));
        assert_eq!(exec.spin().status, SpinStatus::ExecutedTask);
        assert_eq!(exec.spin().status, SpinStatus::NoTasks);
    }
}
