#[cfg(feature = "std")]
mod std_thread {
    use crate::error::OsError;

    pub struct JoinHandle(std::thread::JoinHandle<()>);

    pub fn spawn<F: FnOnce() + Send + 'static>(f: F) -> Result<JoinHandle, OsError> {
        std::thread::Builder::new()
            .name("bg-executor-driver".into())
            .spawn(f)
            .map(JoinHandle)
            .map_err(|_| OsError::ThreadSpawnFailed)
    }

    impl JoinHandle {
        pub fn join(self) -> Result<(), OsError> {
            self.0.join().map_err(|_| OsError::ThreadJoinFailed)
        }
    }
}

#[cfg(feature = "std")]
pub use std_thread::{spawn, JoinHandle};
