#[cfg(feature = "std")]
mod std_sync {
    use crate::clock::{Clock, Instant};
    use crate::error::OsError;
    use core::ops::{Deref, DerefMut};
    use std::time::Duration;

    /// Non-reentrant mutex facade (spec §6).
    ///
    /// A poisoned lock - some previous holder panicked while holding it - is
    /// surfaced as `OsError::SyncPrimitiveFailed` rather than silently
    /// recovered: spec.md §7 classes this as a `SystemError`, and §4.6's
    /// driver-loop pseudocode has an explicit "any other error: release the
    /// mutex, exit the loop" branch that depends on this actually being
    /// observable instead of papered over.
    pub struct Mutex<T>(std::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub const fn new(value: T) -> Self {
            Self(std::sync::Mutex::new(value))
        }

        pub fn lock(&self) -> Result<MutexGuard<'_, T>, OsError> {
            self.0
                .lock()
                .map(MutexGuard)
                .map_err(|_| OsError::SyncPrimitiveFailed)
        }
    }

    pub struct MutexGuard<'a, T>(std::sync::MutexGuard<'a, T>);

    impl<T> Deref for MutexGuard<'_, T> {
        type Target = T;
        fn deref(&self) -> &T {
            &self.0
        }
    }

    impl<T> DerefMut for MutexGuard<'_, T> {
        fn deref_mut(&mut self) -> &mut T {
            &mut self.0
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    pub enum WaitOutcome {
        Woken,
        TimedOut,
    }

    /// Condition variable facade with a timed wait (spec §6). `wait` and
    /// `wait_until` tolerate spurious wake-ups exactly like `std`'s own
    /// `Condvar` — callers are expected to re-check their predicate in a
    /// loop, which `bg-executor`'s driver loop does. A wait on a poisoned
    /// mutex surfaces `OsError::SyncPrimitiveFailed` for the same reason
    /// `Mutex::lock` does, rather than recovering the guard and pretending
    /// the poisoning never happened.
    pub struct Condvar(std::sync::Condvar);

    impl Condvar {
        pub const fn new() -> Self {
            Self(std::sync::Condvar::new())
        }

        pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> Result<MutexGuard<'a, T>, OsError> {
            self.0
                .wait(guard.0)
                .map(MutexGuard)
                .map_err(|_| OsError::SyncPrimitiveFailed)
        }

        /// Waits until `deadline` as measured by `clock`, or until woken.
        pub fn wait_until<'a, T, C: Clock + ?Sized>(
            &self,
            guard: MutexGuard<'a, T>,
            clock: &C,
            deadline: Instant,
        ) -> Result<(MutexGuard<'a, T>, WaitOutcome), OsError> {
            let now = clock.now();
            let timeout = Duration::from_millis(clock.elapsed_ms_since(now, deadline));
            let (guard, result) = self
                .0
                .wait_timeout(guard.0, timeout)
                .map_err(|_| OsError::SyncPrimitiveFailed)?;
            let outcome = if result.timed_out() {
                WaitOutcome::TimedOut
            } else {
                WaitOutcome::Woken
            };
            Ok((MutexGuard(guard), outcome))
        }

        pub fn notify_all(&self) {
            self.0.notify_all();
        }
    }

    impl Default for Condvar {
        fn default() -> Self {
            Self::new()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::sync::Arc;

        #[test]
        fn lock_succeeds_and_round_trips_a_value() {
            let mutex = Mutex::new(5);
            assert_eq!(*mutex.lock().unwrap(), 5);
        }

        #[test]
        fn lock_after_a_panicking_holder_surfaces_sync_primitive_failed() {
            let mutex = Arc::new(Mutex::new(0));
            let poisoner = Arc::clone(&mutex);
            let result = std::thread::spawn(move || {
                let _guard = poisoner.lock().unwrap();
                panic!("poison the lock on purpose");
            })
            .join();
            assert!(result.is_err(), "the spawned thread must have panicked");

            assert!(matches!(mutex.lock(), Err(OsError::SyncPrimitiveFailed)));
        }

        #[test]
        fn wait_surfaces_sync_primitive_failed_when_its_own_holder_panics() {
            let mutex = Arc::new(Mutex::new(false));
            let condvar = Arc::new(Condvar::new());

            let waiter_mutex = Arc::clone(&mutex);
            let waiter_condvar = Arc::clone(&condvar);
            let waiter = std::thread::spawn(move || {
                let guard = waiter_mutex.lock().unwrap();
                // Poisons the mutex as soon as this thread's `wait` call
                // above it unwinds: a panic while parked inside `Condvar::wait`
                // poisons the lock exactly like a panic while merely holding
                // it does.
                let _guard = waiter_condvar.wait(guard).unwrap();
                panic!("unreachable: the notifier below always panics first");
            });

            // Give the waiter time to actually park inside `wait` before the
            // notifier poisons the mutex out from under it.
            std::thread::sleep(Duration::from_millis(20));

            let notifier_mutex = Arc::clone(&mutex);
            let notifier_condvar = Arc::clone(&condvar);
            std::thread::spawn(move || {
                let mut guard = notifier_mutex.lock().unwrap();
                *guard = true;
                notifier_condvar.notify_all();
                panic!("poison the lock while the waiter is parked");
            })
            .join()
            .unwrap_err();

            assert!(waiter.join().is_err());
            assert!(matches!(mutex.lock(), Err(OsError::SyncPrimitiveFailed)));
        }
    }
}

#[cfg(feature = "std")]
pub use std_sync::{Condvar, Mutex, MutexGuard, WaitOutcome};
