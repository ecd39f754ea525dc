use crate::Error;
use atomic_cell::{AtomicUsizeCell, Ordering};
use exec_os::sync::{Condvar, Mutex, WaitOutcome};
use exec_os::{Clock, Os, OsError};
use std::sync::Arc;
use task_executor::{Executor, Future, SpinStatus, DEFAULT_CAPACITY};

struct State<O: Os, const N: usize> {
    executor: Executor<O, N>,
    stop_requested: bool,
    running: bool,
}

struct Inner<O: Os, const N: usize> {
    state: Mutex<State<O, N>>,
    condvar: Condvar,
    /// The only atomic shared outside the mutex (spec §5): count of
    /// outstanding `suspend` holders plus one transient increment per
    /// in-flight `spawn`/`destroy` call, exactly as spec.md §4.6 describes.
    suspend_counter: AtomicUsizeCell,
    os: O,
}

/// A [`task_executor::Executor`] driven by a dedicated background thread
/// (spec §4.6, component F).
///
/// There is exactly one owning handle per background executor - the driver
/// thread holds its own independent reference count on the shared `Inner`
/// (see spec §9, "cyclic ownership"), but `BackgroundExecutor` itself is not
/// `Clone`. An embedder that needs to call `spawn`/`suspend`/`resume` from
/// several producer threads can still do so through a shared reference
/// (or their own `Arc<BackgroundExecutor<_>>`) since those three operations
/// only need `&self` - the inner mutex is what actually serializes them.
/// `destroy` takes `self` by value, which is the Rust-idiomatic replacement
/// for spec.md's "tolerate a null-refcount executor" requirement: the type
/// system, not a runtime check, rules out calling any operation on an
/// already-destroyed instance.
pub struct BackgroundExecutor<O: Os, const N: usize = DEFAULT_CAPACITY> {
    inner: Arc<Inner<O, N>>,
    join_handle: Option<exec_os::thread::JoinHandle>,
}

impl<O: Os, const N: usize> BackgroundExecutor<O, N> {
    /// Allocates the inner state, initializes the mutex/condvar/counters,
    /// and spawns the driver thread. On thread-spawn failure nothing has
    /// been left running; the partially built state is simply dropped.
    pub fn new(os: O) -> Result<Self, Error> {
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                executor: Executor::new(os.clone()),
                stop_requested: false,
                running: false,
            }),
            condvar: Condvar::new(),
            suspend_counter: AtomicUsizeCell::new(0),
            os,
        });

        let driver_inner = Arc::clone(&inner);
        let join_handle = inner.os.spawn(move || driver_loop(driver_inner))?;
        tracing::debug!("background executor driver thread spawned");

        Ok(Self {
            inner,
            join_handle: Some(join_handle),
        })
    }

    /// Enqueues `future` onto the inner executor's FIFO (spec §4.6 Spawn):
    /// bumps the suspend counter to take the lock without racing a `spin` in
    /// progress, spawns, then releases and wakes the driver.
    pub fn spawn(&self, future: Future<O, N>) -> Result<(), Error> {
        self.inner.suspend_counter.fetch_add(1, Ordering::AcqRel);
        let mut state = match self.inner.state.lock() {
            Ok(state) => state,
            Err(err) => {
                self.inner.suspend_counter.fetch_sub(1, Ordering::AcqRel);
                return Err(err.into());
            }
        };
        let spawned = state.executor.spawn(future);
        self.inner.suspend_counter.fetch_sub(1, Ordering::AcqRel);
        self.inner.condvar.notify_all();
        drop(state);

        if spawned {
            Ok(())
        } else {
            Err(Error::OutOfMemory)
        }
    }

    /// Blocks the driver from entering `spin` until a matching [`resume`]
    /// call. Exclusive only in the advisory sense spec.md §4.6 describes:
    /// nothing stops a second caller from also suspending (counts just
    /// stack), but every `suspend` must be matched by exactly one `resume`.
    ///
    /// [`resume`]: Self::resume
    pub fn suspend(&self) -> Result<(), Error> {
        self.inner.suspend_counter.fetch_add(1, Ordering::AcqRel);
        match self.inner.state.lock() {
            Ok(state) => {
                drop(state);
                Ok(())
            }
            Err(err) => {
                // The suspend never actually took effect, so undo the count
                // bump rather than leave the counter stuck above zero.
                self.inner.suspend_counter.fetch_sub(1, Ordering::AcqRel);
                Err(err.into())
            }
        }
    }

    /// Releases one `suspend` hold and wakes the driver.
    pub fn resume(&self) -> Result<(), Error> {
        let lock_result = self.inner.state.lock();
        // Undo `suspend`'s increment regardless of whether the lock could be
        // acquired: a lock failure here is the driver's problem, not a
        // reason to leave this caller's own suspend hold stuck forever.
        self.inner.suspend_counter.fetch_sub(1, Ordering::AcqRel);
        self.inner.condvar.notify_all();
        match lock_result {
            Ok(state) => {
                drop(state);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Requests a stop, waits for the driver loop to exit, and joins the
    /// thread (spec §4.6 `destroy`). Consuming `self` means this can only
    /// ever run once per instance.
    pub fn destroy(mut self) -> Result<(), Error> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        let Some(join_handle) = self.join_handle.take() else {
            return Err(Error::InvalidState);
        };

        self.inner.suspend_counter.fetch_add(1, Ordering::AcqRel);
        match self.inner.state.lock() {
            Ok(mut state) => {
                state.stop_requested = true;
                self.inner.suspend_counter.fetch_sub(1, Ordering::AcqRel);
                self.inner.condvar.notify_all();
                while state.running {
                    match self.inner.condvar.wait(state) {
                        Ok(guard) => state = guard,
                        Err(err) => {
                            // spec §7: a SystemError here still leaves the
                            // executor in a drained state - the driver loop
                            // already exits on the same kind of failure, so
                            // there is nothing left to wait for.
                            tracing::warn!(
                                %err,
                                "condvar failed while waiting for the driver to stop; joining anyway"
                            );
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                self.inner.suspend_counter.fetch_sub(1, Ordering::AcqRel);
                tracing::warn!(
                    %err,
                    "failed to signal stop to the background executor driver; joining directly"
                );
            }
        }

        join_handle.join()?;
        tracing::debug!("background executor driver thread joined");
        Ok(())
    }
}

/// Ensures a `BackgroundExecutor` dropped without an explicit [`destroy`]
/// call still tears down cleanly (spec §3 invariant 3: destructors run on
/// every termination path, teardown included).
///
/// [`destroy`]: BackgroundExecutor::destroy
impl<O: Os, const N: usize> Drop for BackgroundExecutor<O, N> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// The driver loop (spec §4.6), transcribed from
/// `_z_background_executor_inner_run_forever`: lock once, run until
/// `stop_requested`, sleeping on the condvar whenever there is a suspender,
/// no work, or work that is not due yet.
///
/// Any sync-primitive failure is handled by [`run_driver_loop`]'s `?`
/// propagation; this wrapper just logs it. The thread simply exits at that
/// point - spec §7: a `SystemError` here "terminates the loop", and
/// `destroy` is written to still join and free in that drained state (see
/// its own error handling below).
fn driver_loop<O: Os, const N: usize>(inner: Arc<Inner<O, N>>) {
    if let Err(err) = run_driver_loop(&inner) {
        tracing::warn!(%err, "background executor driver loop exiting after a sync primitive failure");
    }
}

/// The fallible body of [`driver_loop`]. spec.md §4.6's pseudocode ends its
/// condvar-wait branches with "any other error: release the mutex, exit the
/// loop" - every `?` below is that branch. `Mutex::lock`/`Condvar::wait`/
/// `wait_until` only fail when the lock has been poisoned by a panicking
/// holder, and producing that error already drops the guard it was holding
/// (see `exec_os::sync`), which is what releases the mutex.
fn run_driver_loop<O: Os, const N: usize>(inner: &Arc<Inner<O, N>>) -> Result<(), OsError> {
    let mut state = inner.state.lock()?;
    state.running = true;
    tracing::debug!("background executor driver loop starting");

    while !state.stop_requested {
        while inner.suspend_counter.load(Ordering::Acquire) > 0 {
            state = inner.condvar.wait(state)?;
        }
        if state.stop_requested {
            break;
        }

        let result = state.executor.spin();
        match result.status {
            SpinStatus::NoTasks => {
                tracing::trace!("driver idle, waiting for work");
                state = inner.condvar.wait(state)?;
            }
            SpinStatus::ShouldWait => {
                let wake_up_time = result
                    .next_wake_up_time
                    .expect("ShouldWait always carries a wake-up time");
                let now = inner.os.now();
                if inner.os.elapsed_ms_since(now, wake_up_time) > 1 {
                    let (guard, outcome) =
                        inner.condvar.wait_until(state, &inner.os, wake_up_time)?;
                    state = guard;
                    if outcome == WaitOutcome::TimedOut {
                        tracing::trace!("driver woke on schedule for a timed future");
                    }
                }
                // Else the wake-up time is effectively now: loop immediately
                // rather than risk oversleeping past it.
            }
            SpinStatus::ExecutedTask => {
                // More work may be ready; loop straight back into spin.
            }
            SpinStatus::Failed => {
                tracing::warn!("spin could not re-enqueue a future; it was cancelled");
            }
        }
    }

    state.running = false;
    inner.condvar.notify_all();
    tracing::debug!("background executor driver loop exiting");
    Ok(())
}

/// Model-checks the suspend counter in isolation: spec.md §3 invariant 4
/// says it is "non-negative" and §5 says it is "the only atomic shared
/// outside the mutex". This loom harness does not attempt to model the
/// mutex/condvar handoff around it (that part is a real OS primitive, not
/// something loom can drive) - it isolates the one piece of concurrency the
/// suspend/resume pair actually relies on being correct: two concurrent
/// `suspend`/`resume` pairs never leave the counter negative or stuck above
/// zero.
#[cfg(feature = "loom")]
mod loom_tests {
    use atomic_cell::{AtomicUsizeCell, Ordering};
    use loom::sync::Arc;

    #[test]
    fn concurrent_suspend_resume_pairs_always_settle_back_to_zero() {
        loom::model(|| {
            let counter = Arc::new(AtomicUsizeCell::new(0));

            let workers: Vec<_> = (0..2)
                .map(|_| {
                    let counter = Arc::clone(&counter);
                    loom::thread::spawn(move || {
                        counter.fetch_add(1, Ordering::AcqRel);
                        let after_suspend = counter.load(Ordering::Acquire);
                        assert!(after_suspend >= 1, "our own suspend must be visible");
                        counter.fetch_sub(1, Ordering::AcqRel);
                    })
                })
                .collect();

            for worker in workers {
                worker.join().unwrap();
            }

            assert_eq!(counter.load(Ordering::Acquire), 0);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exec_os::clock::ManualClock;
    use exec_os::thread::JoinHandle;
    use exec_os::OsError;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as StdOrdering};
    use std::time::Duration;
    use task_executor::StepResult;

    /// Test-only [`Os`] combining a real thread spawn (background executor
    /// tests need an actual second thread) with a shared [`ManualClock`] so
    /// timed-future assertions do not depend on wall-clock sleeps.
    #[derive(Clone)]
    struct TestOs {
        clock: Arc<ManualClock>,
    }

    impl TestOs {
        fn new() -> Self {
            Self {
                clock: Arc::new(ManualClock::new()),
            }
        }

        fn advance(&self, ms: u64) {
            self.clock.advance(ms);
        }
    }

    impl Clock for TestOs {
        fn now(&self) -> exec_os::Instant {
            self.clock.now()
        }
    }

    impl Os for TestOs {
        fn spawn<F: FnOnce() + Send + 'static>(&self, f: F) -> Result<JoinHandle, OsError> {
            exec_os::thread::spawn(f)
        }

        fn sleep_ms(&self, ms: u64) {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }

    fn wait_until<F: Fn() -> bool>(predicate: F, timeout: Duration) {
        let start = std::time::Instant::now();
        while !predicate() {
            assert!(start.elapsed() < timeout, "condition never became true");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn spawn_and_forget_runs_and_destroys() {
        let bg: BackgroundExecutor<TestOs, 4> = BackgroundExecutor::new(TestOs::new()).unwrap();
        static RAN: AtomicUsize = AtomicUsize::new(0);
        RAN.store(0, StdOrdering::SeqCst);

        let future = Future::new(|_| {
            RAN.fetch_add(1, StdOrdering::SeqCst);
            StepResult::ready()
        });
        bg.spawn(future).unwrap();

        wait_until(|| RAN.load(StdOrdering::SeqCst) == 1, Duration::from_secs(2));
        bg.destroy().unwrap();
    }

    #[test]
    fn suspend_blocks_spawned_work_until_resume() {
        let os = TestOs::new();
        let bg: BackgroundExecutor<TestOs, 4> = BackgroundExecutor::new(os).unwrap();
        static RAN: AtomicUsize = AtomicUsize::new(0);
        RAN.store(0, StdOrdering::SeqCst);

        bg.suspend().unwrap();
        let future = Future::new(|_| {
            RAN.fetch_add(1, StdOrdering::SeqCst);
            StepResult::ready()
        });
        bg.spawn(future).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(RAN.load(StdOrdering::SeqCst), 0, "driver must not spin while suspended");

        bg.resume().unwrap();
        wait_until(|| RAN.load(StdOrdering::SeqCst) == 1, Duration::from_secs(2));
        bg.destroy().unwrap();
    }

    #[test]
    fn r2_suspend_then_resume_round_trip_leaves_the_driver_able_to_run_normally() {
        // spec §8 R2: suspend∘resume leaves internal counters unchanged. The
        // suspend counter itself is private, so this observes the same fact
        // through its only externally visible effect - a round trip must
        // leave the driver exactly as able to run work as if neither call
        // had happened, not permanently stuck above zero.
        let os = TestOs::new();
        let bg: BackgroundExecutor<TestOs, 4> = BackgroundExecutor::new(os).unwrap();

        bg.suspend().unwrap();
        bg.resume().unwrap();

        static RAN: AtomicUsize = AtomicUsize::new(0);
        RAN.store(0, StdOrdering::SeqCst);
        let future = Future::new(|_| {
            RAN.fetch_add(1, StdOrdering::SeqCst);
            StepResult::ready()
        });
        bg.spawn(future).unwrap();

        wait_until(|| RAN.load(StdOrdering::SeqCst) == 1, Duration::from_secs(2));
        bg.destroy().unwrap();
    }

    #[test]
    fn r3_n_futures_interleaved_with_suspend_resume_each_run_and_destroy_exactly_once() {
        // spec §8 R3: spawning N immediate-finish futures and draining them
        // yields exactly N executions and N destroys, regardless of
        // interleaving with additional suspends/resumes.
        const FUTURES: usize = 5;
        static RUN_COUNT: AtomicUsize = AtomicUsize::new(0);
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);
        RUN_COUNT.store(0, StdOrdering::SeqCst);
        DROP_COUNT.store(0, StdOrdering::SeqCst);

        struct CountsDrop;
        impl Drop for CountsDrop {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, StdOrdering::SeqCst);
            }
        }

        let os = TestOs::new();
        let bg: BackgroundExecutor<TestOs, 8> = BackgroundExecutor::new(os).unwrap();

        for i in 0..FUTURES {
            let marker = CountsDrop;
            let future = Future::new(move |_| {
                let _keep_alive = &marker;
                RUN_COUNT.fetch_add(1, StdOrdering::SeqCst);
                StepResult::ready()
            });
            bg.spawn(future).unwrap();

            if i % 2 == 0 {
                bg.suspend().unwrap();
                bg.resume().unwrap();
            }
        }

        wait_until(
            || RUN_COUNT.load(StdOrdering::SeqCst) == FUTURES,
            Duration::from_secs(2),
        );
        bg.destroy().unwrap();

        assert_eq!(RUN_COUNT.load(StdOrdering::SeqCst), FUTURES);
        assert_eq!(DROP_COUNT.load(StdOrdering::SeqCst), FUTURES);
    }

    #[test]
    fn destroy_is_unreachable_twice_by_construction() {
        // `destroy` consumes `self`, so a second call is a compile error,
        // not a runtime `InvalidState` - this test documents that via the
        // internal `shutdown` escape hatch instead, the only way to observe
        // the second-call behavior at all.
        let mut bg: BackgroundExecutor<TestOs, 4> = BackgroundExecutor::new(TestOs::new()).unwrap();
        bg.shutdown().unwrap();
        assert!(matches!(bg.shutdown(), Err(Error::InvalidState)));
    }

    #[test]
    fn timed_future_wakes_the_driver_at_its_scheduled_instant() {
        let os = TestOs::new();
        let bg: BackgroundExecutor<TestOs, 4> = BackgroundExecutor::new(os.clone()).unwrap();
        static RUNS: AtomicU64 = AtomicU64::new(0);
        RUNS.store(0, StdOrdering::SeqCst);

        let mut ran_once = false;
        let clock = os.clone();
        let future = Future::new(move |_exec: &mut Executor<TestOs, 4>| {
            if ran_once {
                RUNS.fetch_add(1, StdOrdering::SeqCst);
                return StepResult::ready();
            }
            ran_once = true;
            let target = clock.advance_ms(clock.now(), 50);
            StepResult::pending_until(target)
        });
        bg.spawn(future).unwrap();

        // Let the driver run the first step and settle into `ShouldWait`;
        // the manual clock hasn't moved yet, so the second step must not
        // have run.
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(RUNS.load(StdOrdering::SeqCst), 0);

        os.advance(100);
        wait_until(|| RUNS.load(StdOrdering::SeqCst) == 1, Duration::from_secs(2));
        bg.destroy().unwrap();
    }
}
