//! Background executor (spec §4.6, component F): a dedicated driver thread
//! wrapping [`task_executor::Executor`] behind a mutex, a condition
//! variable, and a suspend counter, so producers on other threads can
//! enqueue work, pause the driver, or tear it down.
//!
//! Unlike [`task-executor`](../task_executor/index.html), this crate is not
//! `no_std`: the driver loop needs a real OS thread, mutex, and condition
//! variable, and spec.md's own design notes (§4 component G) place those
//! behind concrete `std`-backed types in [`exec_os::sync`] rather than a
//! generic trait, on the grounds that every target expected to run this
//! driver has exactly one real implementation of each underneath. `bg-
//! executor` is still generic over [`exec_os::Os`] so an embedder can plug
//! in their own clock/thread-spawn pair.

mod error;
mod executor;

pub use error::Error;
pub use executor::BackgroundExecutor;
