//! Fixed-width atomic cells with explicit memory orderings.
//!
//! On targets without hardware atomics the same API degrades to plain
//! loads/stores backed by an `UnsafeCell`, and `fence` becomes a no-op.
//! Everywhere else this is a thin, lock-free wrapper over
//! `core::sync::atomic`.

#![cfg_attr(not(any(test, feature = "loom")), no_std)]

pub use core::sync::atomic::Ordering;

// Under the `loom` feature every cell is backed by loom's shadow atomics
// instead of `core::sync::atomic`, so a dependent crate's loom model
// actually explores interleavings of the CAS loops built on top of this
// crate (see `task-executor`'s `loom`-gated handle tests). loom needs `std`,
// which is why this feature also turns off `no_std` above.
#[cfg(feature = "loom")]
mod backend {
    use core::sync::atomic::Ordering;
    use loom::sync::atomic::{AtomicBool, AtomicUsize};

    pub struct AtomicUsizeCell(AtomicUsize);

    impl AtomicUsizeCell {
        pub fn new(value: usize) -> Self {
            Self(AtomicUsize::new(value))
        }

        pub fn load(&self, order: Ordering) -> usize {
            self.0.load(order)
        }

        pub fn store(&self, value: usize, order: Ordering) {
            self.0.store(value, order);
        }

        pub fn fetch_add(&self, value: usize, order: Ordering) -> usize {
            self.0.fetch_add(value, order)
        }

        pub fn fetch_sub(&self, value: usize, order: Ordering) -> usize {
            self.0.fetch_sub(value, order)
        }

        pub fn compare_exchange(
            &self,
            current: usize,
            new: usize,
            success: Ordering,
            failure: Ordering,
        ) -> Result<usize, usize> {
            self.0.compare_exchange(current, new, success, failure)
        }

        pub fn compare_exchange_weak(
            &self,
            current: usize,
            new: usize,
            success: Ordering,
            failure: Ordering,
        ) -> Result<usize, usize> {
            self.0.compare_exchange_weak(current, new, success, failure)
        }
    }

    pub struct AtomicBoolCell(AtomicBool);

    impl AtomicBoolCell {
        pub fn new(value: bool) -> Self {
            Self(AtomicBool::new(value))
        }

        pub fn load(&self, order: Ordering) -> bool {
            self.0.load(order)
        }

        pub fn store(&self, value: bool, order: Ordering) {
            self.0.store(value, order);
        }
    }

    pub fn fence(order: Ordering) {
        loom::sync::atomic::fence(order);
    }
}

#[cfg(all(not(feature = "loom"), target_has_atomic = "ptr"))]
mod backend {
    use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub struct AtomicUsizeCell(AtomicUsize);

    impl AtomicUsizeCell {
        pub const fn new(value: usize) -> Self {
            Self(AtomicUsize::new(value))
        }

        pub fn load(&self, order: Ordering) -> usize {
            self.0.load(order)
        }

        pub fn store(&self, value: usize, order: Ordering) {
            self.0.store(value, order);
        }

        pub fn fetch_add(&self, value: usize, order: Ordering) -> usize {
            self.0.fetch_add(value, order)
        }

        pub fn fetch_sub(&self, value: usize, order: Ordering) -> usize {
            self.0.fetch_sub(value, order)
        }

        pub fn compare_exchange(
            &self,
            current: usize,
            new: usize,
            success: Ordering,
            failure: Ordering,
        ) -> Result<usize, usize> {
            self.0.compare_exchange(current, new, success, failure)
        }

        pub fn compare_exchange_weak(
            &self,
            current: usize,
            new: usize,
            success: Ordering,
            failure: Ordering,
        ) -> Result<usize, usize> {
            self.0.compare_exchange_weak(current, new, success, failure)
        }
    }

    pub struct AtomicBoolCell(AtomicBool);

    impl AtomicBoolCell {
        pub const fn new(value: bool) -> Self {
            Self(AtomicBool::new(value))
        }

        pub fn load(&self, order: Ordering) -> bool {
            self.0.load(order)
        }

        pub fn store(&self, value: bool, order: Ordering) {
            self.0.store(value, order);
        }
    }

    pub fn fence(order: Ordering) {
        core::sync::atomic::fence(order);
    }
}

#[cfg(all(not(feature = "loom"), not(target_has_atomic = "ptr")))]
mod backend {
    use super::Ordering;
    use core::cell::UnsafeCell;

    // No hardware atomics on this target: there is exactly one logical
    // worker, so plain reads/writes are already race-free.
    pub struct AtomicUsizeCell(UnsafeCell<usize>);
    unsafe impl Sync for AtomicUsizeCell {}

    impl AtomicUsizeCell {
        pub const fn new(value: usize) -> Self {
            Self(UnsafeCell::new(value))
        }

        pub fn load(&self, _order: Ordering) -> usize {
            unsafe { *self.0.get() }
        }

        pub fn store(&self, value: usize, _order: Ordering) {
            unsafe {
                *self.0.get() = value;
            }
        }

        pub fn fetch_add(&self, value: usize, _order: Ordering) -> usize {
            unsafe {
                let slot = &mut *self.0.get();
                let prev = *slot;
                *slot = prev.wrapping_add(value);
                prev
            }
        }

        pub fn fetch_sub(&self, value: usize, _order: Ordering) -> usize {
            unsafe {
                let slot = &mut *self.0.get();
                let prev = *slot;
                *slot = prev.wrapping_sub(value);
                prev
            }
        }

        pub fn compare_exchange(
            &self,
            current: usize,
            new: usize,
            _success: Ordering,
            _failure: Ordering,
        ) -> Result<usize, usize> {
            unsafe {
                let slot = &mut *self.0.get();
                if *slot == current {
                    *slot = new;
                    Ok(current)
                } else {
                    Err(*slot)
                }
            }
        }

        pub fn compare_exchange_weak(
            &self,
            current: usize,
            new: usize,
            success: Ordering,
            failure: Ordering,
        ) -> Result<usize, usize> {
            self.compare_exchange(current, new, success, failure)
        }
    }

    pub struct AtomicBoolCell(UnsafeCell<bool>);
    unsafe impl Sync for AtomicBoolCell {}

    impl AtomicBoolCell {
        pub const fn new(value: bool) -> Self {
            Self(UnsafeCell::new(value))
        }

        pub fn load(&self, _order: Ordering) -> bool {
            unsafe { *self.0.get() }
        }

        pub fn store(&self, value: bool, _order: Ordering) {
            unsafe {
                *self.0.get() = value;
            }
        }
    }

    pub fn fence(_order: Ordering) {}
}

pub use backend::{fence, AtomicBoolCell, AtomicUsizeCell};
