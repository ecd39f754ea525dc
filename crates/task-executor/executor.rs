use crate::future::{cmp_by_wake_time, to_wake_up_time_ms, Future, TimedFuture};
use crate::handle::Status;
use bounded_collections::{BinaryHeap, Deque};
use exec_os::{Clock, Instant};

/// Default store capacity (spec.md §4.5: "capacity of each store is fixed at
/// compile time, default 16 each").
pub const DEFAULT_CAPACITY: usize = 16;

/// Outcome of one call to [`Executor::spin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinStatus {
    /// Both stores were empty; nothing to do.
    NoTasks,
    /// A future ran to completion or was re-enqueued.
    ExecutedTask,
    /// Nothing is runnable right now, but a timed future exists; the caller
    /// should wait until `next_wake_up_time` (or any earlier wake reason)
    /// before spinning again.
    ShouldWait,
    /// A future could not be re-enqueued (a store was at capacity); it was
    /// force-cancelled and dropped.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinResult {
    pub status: SpinStatus,
    pub next_wake_up_time: Option<Instant>,
}

/// The single-threaded cooperative executor (spec.md §4.5, component E): a
/// FIFO deque of ready futures and a min-heap of timed futures, stepped one
/// at a time by [`spin`](Self::spin).
pub struct Executor<C, const N: usize = DEFAULT_CAPACITY> {
    tasks: Deque<Future<C, N>, N>,
    timed_tasks: BinaryHeap<TimedFuture<C, N>, N>,
    epoch: Instant,
    clock: C,
}

impl<C: Clock, const N: usize> Executor<C, N> {
    pub fn new(clock: C) -> Self {
        let epoch = clock.now();
        Self {
            tasks: Deque::new(),
            timed_tasks: BinaryHeap::new(cmp_by_wake_time),
            epoch,
            clock,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty() && self.timed_tasks.is_empty()
    }

    /// Enqueues a future at the back of the FIFO. Returns `false` if the
    /// FIFO store is at capacity; the future's destructor runs (it is
    /// dropped) and its handle, if any, is marked `Cancelled` before that
    /// happens (spec.md §4.5 Spawn / boundary behaviors).
    pub fn spawn(&mut self, future: Future<C, N>) -> bool {
        match self.tasks.push_back(future) {
            Ok(()) => true,
            Err(rejected) => {
                if let Some(handle) = &rejected.handle {
                    handle.finish(Status::Cancelled);
                }
                tracing::warn!("spawn failed: task store at capacity, future dropped");
                drop(rejected);
                false
            }
        }
    }

    /// Runs one step of the scheduler: picks the next runnable future (if
    /// any), invokes it once, and records the outcome. See spec.md §4.5 for
    /// the full ten-step algorithm this mirrors.
    ///
    /// Step 6's "cancellation-skip loop" happens entirely inside this one
    /// call (`examples/original_source/src/collections/executor.c`'s
    /// `_z_executor_spin` wraps the whole selection in a `while (true)` for
    /// exactly this reason): a future cancelled while it sat `Pending` in a
    /// store is dropped without running, and selection retries from step 1
    /// rather than handing a no-op back to the caller. A caller only ever
    /// sees `ExecutedTask` for a future that actually stepped.
    pub fn spin(&mut self) -> SpinResult {
        let mut future = loop {
            let candidate = match self.next_runnable() {
                NextFuture::None => {
                    return SpinResult {
                        status: SpinStatus::NoTasks,
                        next_wake_up_time: None,
                    }
                }
                NextFuture::ShouldWait(wake_up_time) => {
                    return SpinResult {
                        status: SpinStatus::ShouldWait,
                        next_wake_up_time: Some(wake_up_time),
                    }
                }
                NextFuture::Found(future) => future,
            };

            if let Some(handle) = &candidate.handle {
                if !handle.try_begin_execution() {
                    // Cancelled while it sat idle in a store: drop it
                    // unexecuted and go pick the next runnable future
                    // instead of reporting this no-op to the caller.
                    tracing::trace!("dropping cancelled future before execution");
                    drop(candidate);
                    continue;
                }
            }

            break candidate;
        };

        let result = (future.step)(self);

        if result.ready {
            if let Some(handle) = &future.handle {
                handle.finish(Status::Ready);
            }
            tracing::trace!("future reached Ready");
            drop(future);
            return SpinResult {
                status: SpinStatus::ExecutedTask,
                next_wake_up_time: None,
            };
        }

        if let Some(handle) = &future.handle {
            handle.finish(Status::Pending);
        }

        match result.wake_up_time {
            None => match self.tasks.push_back(future) {
                Ok(()) => SpinResult {
                    status: SpinStatus::ExecutedTask,
                    next_wake_up_time: None,
                },
                Err(rejected) => self.force_cancel(rejected),
            },
            Some(wake_up_time) => {
                let wake_up_time_ms = to_wake_up_time_ms(&self.clock, self.epoch, wake_up_time);
                let timed = TimedFuture {
                    future,
                    wake_up_time_ms,
                };
                match self.timed_tasks.push(timed) {
                    Ok(()) => SpinResult {
                        status: SpinStatus::ExecutedTask,
                        next_wake_up_time: None,
                    },
                    Err(rejected) => self.force_cancel(rejected.future),
                }
            }
        }
    }

    /// A store rejected a re-enqueue because it is at capacity: mark the
    /// handle `Cancelled`, drop the future, and report `Failed` (spec.md
    /// §4.6 failure semantics).
    fn force_cancel(&self, future: Future<C, N>) -> SpinResult {
        if let Some(handle) = &future.handle {
            handle.finish(Status::Cancelled);
        }
        tracing::warn!("re-enqueue failed: store at capacity, future force-cancelled");
        drop(future);
        SpinResult {
            status: SpinStatus::Failed,
            next_wake_up_time: None,
        }
    }

    fn next_runnable(&mut self) -> NextFuture<C, N> {
        let now = self.clock.now();

        let ready_wake_up_time = self.timed_tasks.peek().map(|timed| {
            self.clock.advance_ms(self.epoch, timed.wake_up_time_ms)
        });

        match ready_wake_up_time {
            Some(wake_up_time) if wake_up_time <= now => {
                let timed = self.timed_tasks.pop().expect("just peeked");
                match self.tasks.pop_front() {
                    Some(head) => {
                        // The timed future is ready to run, but the FIFO
                        // head still has priority; demote the timed future
                        // to the back of the FIFO for the next spin.
                        self.tasks
                            .push_back(timed.future)
                            .unwrap_or_else(|_| unreachable!("slot just freed by pop_front"));
                        NextFuture::Found(head)
                    }
                    None => NextFuture::Found(timed.future),
                }
            }
            Some(wake_up_time) => match self.tasks.pop_front() {
                Some(future) => NextFuture::Found(future),
                None => NextFuture::ShouldWait(wake_up_time),
            },
            None => match self.tasks.pop_front() {
                Some(future) => NextFuture::Found(future),
                None => NextFuture::None,
            },
        }
    }
}

enum NextFuture<C, const N: usize> {
    None,
    ShouldWait(Instant),
    Found(Future<C, N>),
}
