//! A 32-bit memory cell usable with the kernel's block and wake primitives.
//!
//! [`FutexWord`] is the only piece of this crate that talks to the operating
//! system. It leverages `atomic_wait`'s API, that provides unified, cross
//! platform wait and wake functionality: a private `futex(2)` on Linux,
//! `WaitOnAddress` on Windows and `__ulock` on macOS. Every lock and barrier
//! of this crate is composed of one or more of these words.

use core::sync::atomic::Ordering::{self, Relaxed};

use crate::cfg::atomic::AtomicU32;

/// A shared 32-bit word that threads can block on until its value changes.
///
/// The word carries no semantics by itself, it is up to the user to give
/// meaning to the values stored in it. Waiting is always conditional: a call
/// to [`wait`] with an expected value that no longer matches the live value
/// returns immediately, without ever putting the thread to sleep. This is
/// what makes "load, decide, then block" sequences free of lost wake-ups.
///
/// [`wait`]: FutexWord::wait
#[derive(Debug)]
#[repr(transparent)]
pub struct FutexWord {
    value: AtomicU32,
}

impl FutexWord {
    /// Creates a new word holding `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use futex_wait::FutexWord;
    ///
    /// const WORD: FutexWord = FutexWord::new(0);
    /// let word = FutexWord::new(1);
    /// ```
    #[cfg(not(all(loom, test)))]
    #[must_use]
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self { value: AtomicU32::new(value) }
    }

    /// Creates a new word with Loom primitives (non-const).
    #[cfg(all(loom, test))]
    #[cfg(not(tarpaulin_include))]
    pub fn new(value: u32) -> Self {
        Self { value: AtomicU32::new(value) }
    }

    /// Loads the current value of the word.
    #[inline]
    pub fn load(&self, order: Ordering) -> u32 {
        self.value.load(order)
    }

    /// Stores `value` into the word.
    ///
    /// This does not wake any waiter, see [`wake_one`] and [`wake_all`].
    ///
    /// [`wake_one`]: FutexWord::wake_one
    /// [`wake_all`]: FutexWord::wake_all
    #[inline]
    pub fn store(&self, value: u32, order: Ordering) {
        self.value.store(value, order);
    }

    /// Subtracts from the current value, returning the previous value.
    #[inline]
    pub fn fetch_sub(&self, value: u32, order: Ordering) -> u32 {
        self.value.fetch_sub(value, order)
    }

    /// Stores `new` if the current value is `current`.
    ///
    /// Returns the value observed before the operation, whether the exchange
    /// took place or not. The exchange succeeded if and only if the returned
    /// value equals `current`. A failed exchange loads with relaxed ordering.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::sync::atomic::Ordering::Acquire;
    /// use futex_wait::FutexWord;
    ///
    /// let word = FutexWord::new(0);
    /// assert_eq!(word.compare_exchange(0, 1, Acquire), 0);
    /// assert_eq!(word.compare_exchange(0, 2, Acquire), 1);
    /// ```
    #[inline]
    pub fn compare_exchange(&self, current: u32, new: u32, success: Ordering) -> u32 {
        match self.value.compare_exchange(current, new, success, Relaxed) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Blocks the current thread while the word holds `expected`.
    ///
    /// Returns immediately if the live value differs from `expected`. This
    /// function may also return spuriously, callers must re-check the value
    /// they are waiting on.
    #[inline]
    pub fn wait(&self, expected: u32) {
        sys::wait(&self.value, expected);
    }

    /// Wakes at most one thread blocked on this word.
    ///
    /// This is a no-op if no thread is waiting.
    #[inline]
    pub fn wake_one(&self) {
        sys::wake_one(&self.value);
    }

    /// Wakes all threads blocked on this word.
    #[inline]
    pub fn wake_all(&self) {
        sys::wake_all(&self.value);
    }
}

impl Default for FutexWord {
    #[inline]
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(not(all(loom, test)))]
mod sys {
    use core::ptr;
    use core::sync::atomic::AtomicU32;

    pub fn wait(value: &AtomicU32, expected: u32) {
        atomic_wait::wait(value, expected);
    }

    pub fn wake_one(value: &AtomicU32) {
        atomic_wait::wake_one(ptr::addr_of!(*value));
    }

    pub fn wake_all(value: &AtomicU32) {
        atomic_wait::wake_all(ptr::addr_of!(*value));
    }
}

// Loom does not model the kernel, so a wait is a scheduling point that lets
// other threads make progress. Every caller re-checks the word afterwards.
#[cfg(all(loom, test))]
#[cfg(not(tarpaulin_include))]
mod sys {
    use core::sync::atomic::Ordering::Relaxed;

    use loom::sync::atomic::AtomicU32;

    use crate::cfg::thread;

    pub fn wait(value: &AtomicU32, expected: u32) {
        if value.load(Relaxed) == expected {
            thread::yield_now();
        }
    }

    pub fn wake_one(_value: &AtomicU32) {}

    pub fn wake_all(_value: &AtomicU32) {}
}

#[cfg(all(not(loom), test))]
mod test {
    use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::FutexWord;

    #[test]
    fn compare_exchange_returns_previous() {
        let word = FutexWord::new(1);
        assert_eq!(word.compare_exchange(0, 2, Acquire), 1);
        assert_eq!(word.load(Relaxed), 1);
        assert_eq!(word.compare_exchange(1, 2, Acquire), 1);
        assert_eq!(word.load(Relaxed), 2);
    }

    #[test]
    fn wait_on_stale_value_returns() {
        let word = FutexWord::new(3);
        // Would block forever if the value check was not honored.
        word.wait(2);
    }

    #[test]
    fn wake_all_unblocks_waiters() {
        let word = Arc::new(FutexWord::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let word = Arc::clone(&word);
                thread::spawn(move || {
                    while word.load(Acquire) == 0 {
                        word.wait(0);
                    }
                })
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        word.store(1, Release);
        word.wake_all();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn wake_without_waiters() {
        let word = FutexWord::default();
        word.wake_one();
        word.wake_all();
        assert_eq!(word.load(Relaxed), 0);
    }
}
