//! OS facade (spec §6): monotonic clock, mutex, condition variable, thread
//! spawn/join. The executor core treats these as an external collaborator —
//! this crate is the one concrete, `std`-backed instance of that facade,
//! plus the trait boundary so an embedder targeting bare metal can supply
//! their own.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod clock;
pub mod error;
pub mod sync;
pub mod thread;

pub use clock::{Clock, Instant};
pub use error::OsError;

/// Everything `bg-executor`'s driver thread needs from the environment: a
/// clock, and the ability to spawn a thread that runs to completion. Mutex
/// and condvar are not part of this trait — they are concrete types in
/// [`sync`], since every target this core is expected to run the background
/// driver on has a real OS underneath providing exactly one kind of each.
pub trait Os: Clock + Clone + Send + Sync + 'static {
    fn spawn<F: FnOnce() + Send + 'static>(&self, f: F) -> Result<thread::JoinHandle, OsError>;
    fn sleep_ms(&self, ms: u64);
}

#[cfg(feature = "std")]
mod std_os {
    use super::{clock::SystemClock, thread, Clock, Instant, Os, OsError};
    use std::sync::Arc;
    use std::time::Duration;

    /// Default [`Os`] implementation, backed by `std::thread` and a
    /// [`SystemClock`] shared across every clone (so `now()` stays anchored
    /// to one process-wide origin regardless of how many
    /// `BackgroundExecutor`s are created).
    #[derive(Clone)]
    pub struct StdOs {
        clock: Arc<SystemClock>,
    }

    impl StdOs {
        pub fn new() -> Self {
            Self {
                clock: Arc::new(SystemClock::new()),
            }
        }
    }

    impl Default for StdOs {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for StdOs {
        fn now(&self) -> Instant {
            self.clock.now()
        }
    }

    impl Os for StdOs {
        fn spawn<F: FnOnce() + Send + 'static>(&self, f: F) -> Result<thread::JoinHandle, OsError> {
            thread::spawn(f)
        }

        fn sleep_ms(&self, ms: u64) {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }
}

#[cfg(feature = "std")]
pub use std_os::StdOs;
