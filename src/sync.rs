//! # Kernel Lock
//!
//! The one critical section every kernel mutation runs under. On target
//! `cortex-m`'s single-core implementation masks interrupts (PRIMASK) for
//! the duration; the host test build uses `critical-section`'s std lock.
//!
//! Sections must stay short and never span a context switch: an operation
//! that blocks only pends the switch, which is taken after the section ends.

use core::cell::RefCell;

use critical_section::Mutex;

/// Interior-mutable kernel state guarded by the global critical section.
pub struct KernelCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> KernelCell<T> {
    pub const fn new(value: T) -> Self {
        Self { inner: Mutex::new(RefCell::new(value)) }
    }

    /// Run `f` with exclusive access to the state.
    ///
    /// # Panics
    /// Re-entering `with` on the same cell from inside `f` panics.
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_gives_exclusive_mutable_access() {
        static CELL: KernelCell<u32> = KernelCell::new(0);
        for _ in 0..3 {
            CELL.with(|v| *v += 1);
        }
        assert_eq!(CELL.with(|v| *v), 3);
    }
}
