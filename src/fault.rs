//! Deterministic allocation failpoint.
//!
//! Single-threaded hook that lets tests schedule a resource-exhaustion
//! failure a fixed number of allocation checkpoints in the future. Every
//! operation that needs new storage (sequence append, index growth, deep
//! clone) consults [`injected_failure`] before allocating. In normal builds
//! the check compiles to a constant `false` and disappears.

#[cfg(any(test, feature = "fault-injection"))]
mod armed {
    use core::cell::Cell;

    thread_local! {
        static COUNTDOWN: Cell<Option<usize>> = const { Cell::new(None) };
    }

    /// Arm the failpoint: the `n`-th allocation checkpoint from now fails
    /// (`n == 0` fails the next one). The failpoint disarms itself after
    /// firing.
    pub fn fail_after(n: usize) {
        COUNTDOWN.with(|c| c.set(Some(n)));
    }

    /// Disarm the failpoint without firing.
    pub fn disarm() {
        COUNTDOWN.with(|c| c.set(None));
    }

    pub(crate) fn check() -> bool {
        COUNTDOWN.with(|c| match c.get() {
            None => false,
            Some(0) => {
                c.set(None);
                true
            }
            Some(n) => {
                c.set(Some(n - 1));
                false
            }
        })
    }
}

#[cfg(any(test, feature = "fault-injection"))]
pub use armed::{disarm, fail_after};

/// Allocation checkpoint. Returns true when an armed failpoint fires.
#[inline]
pub(crate) fn injected_failure() -> bool {
    #[cfg(any(test, feature = "fault-injection"))]
    {
        armed::check()
    }
    #[cfg(not(any(test, feature = "fault-injection")))]
    {
        false
    }
}
