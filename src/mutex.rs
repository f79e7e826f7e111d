use core::fmt::{self, Debug, Formatter};
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crate::futex::FutexWord;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

/// The observable state of a [`Mutex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Nobody holds the lock.
    Unlocked,
    /// The lock is held and no other thread has asked for it.
    Locked,
    /// The lock is held and some thread is, or was, waiting for it. The
    /// holder must issue a wake when releasing.
    Contended,
}

impl State {
    fn from_raw(value: u32) -> Self {
        match value {
            UNLOCKED => Self::Unlocked,
            LOCKED => Self::Locked,
            _ => Self::Contended,
        }
    }
}

/// A mutual exclusion lock built on a single [`FutexWord`].
///
/// The lock word moves between three states: unlocked, locked and locked
/// with waiters (contended). An uncontended [`lock`] and [`unlock`] pair
/// never enters the kernel. Only a releaser that observes the contended state
/// issues a wake, and only a locker that observes the word held by someone
/// else goes to sleep.
///
/// This lock does not protect any data, it is the raw mutual exclusion
/// primitive that the benchmark measures. Enable the `lock_api` feature for
/// a data-guarding [`lock_api::Mutex`] built on top of it.
///
/// There are no fairness guarantees: the order in which waiters acquire the
/// lock is unspecified. The lock is not reentrant and does not track which
/// thread owns it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use futex_wait::Mutex;
///
/// let mutex = Arc::new(Mutex::new());
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let mutex = Arc::clone(&mutex);
///         thread::spawn(move || {
///             for _ in 0..100 {
///                 mutex.lock();
///                 mutex.unlock();
///             }
///         })
///     })
///     .collect();
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// assert!(!mutex.is_locked());
/// ```
/// [`lock`]: Mutex::lock
/// [`unlock`]: Mutex::unlock
/// [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
pub struct Mutex {
    futex: FutexWord,
}

impl Mutex {
    /// Creates a new mutex in an unlocked state ready for use.
    ///
    /// # Examples
    ///
    /// ```
    /// use futex_wait::Mutex;
    ///
    /// const MUTEX: Mutex = Mutex::new();
    /// let mutex = Mutex::new();
    /// ```
    #[cfg(not(all(loom, test)))]
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self { futex: FutexWord::new(UNLOCKED) }
    }

    /// Creates a new unlocked mutex with Loom primitives (non-const).
    #[cfg(all(loom, test))]
    #[cfg(not(tarpaulin_include))]
    pub fn new() -> Self {
        Self { futex: FutexWord::new(UNLOCKED) }
    }

    /// Acquires this mutex, blocking the current thread until it is able to
    /// do so.
    ///
    /// Calling this function while already holding the lock will deadlock.
    ///
    /// # Examples
    ///
    /// ```
    /// use futex_wait::Mutex;
    ///
    /// let mutex = Mutex::new();
    /// mutex.lock();
    /// assert!(mutex.is_locked());
    /// mutex.unlock();
    /// ```
    #[inline]
    pub fn lock(&self) {
        let mut state = self.futex.load(Relaxed);
        if state == UNLOCKED {
            state = self.futex.compare_exchange(UNLOCKED, LOCKED, Acquire);
        }
        if state != UNLOCKED {
            self.lock_contended(state);
        }
    }

    /// Waits for the lock while someone else holds it.
    ///
    /// Every exchange below returns the value it observed. A waiter only
    /// sleeps on the contended value, which it has either seen or stored
    /// itself, so a release that happened in between makes the wait return
    /// right away instead of sleeping through the wake.
    #[cold]
    fn lock_contended(&self, mut state: u32) {
        while state != UNLOCKED {
            if state == LOCKED {
                state = self.futex.compare_exchange(LOCKED, CONTENDED, Acquire);
            }
            if state != UNLOCKED {
                self.futex.wait(CONTENDED);
                state = self.futex.load(Relaxed);
            }
            // Reacquire as contended, other threads may still be sleeping.
            if state == UNLOCKED {
                state = self.futex.compare_exchange(UNLOCKED, CONTENDED, Acquire);
            }
        }
    }

    /// Attempts to acquire this mutex without blocking.
    ///
    /// Returns `true` if the lock was acquired, `false` otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use futex_wait::Mutex;
    ///
    /// let mutex = Mutex::new();
    /// assert!(mutex.try_lock());
    /// assert!(!mutex.try_lock());
    /// mutex.unlock();
    /// ```
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.futex.compare_exchange(UNLOCKED, LOCKED, Acquire) == UNLOCKED
    }

    /// Releases this mutex and, if some thread may be waiting, wakes one.
    ///
    /// The caller must hold the lock. Unlocking a mutex that is not locked
    /// is a no-op.
    #[inline]
    pub fn unlock(&self) {
        let mut state = self.futex.load(Relaxed);
        if state == LOCKED {
            state = self.futex.compare_exchange(LOCKED, UNLOCKED, Release);
        }
        if state == CONTENDED {
            self.futex.compare_exchange(CONTENDED, UNLOCKED, Release);
            self.futex.wake_one();
        }
    }

    /// Returns `true` if the lock is currently held.
    ///
    /// This function does not guarantee strong ordering, only atomicity.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.futex.load(Relaxed) != UNLOCKED
    }

    /// Returns the current state of the lock word.
    ///
    /// This function does not guarantee strong ordering, only atomicity.
    #[inline]
    pub fn state(&self) -> State {
        State::from_raw(self.futex.load(Relaxed))
    }
}

#[cfg(not(all(loom, test)))]
impl Default for Mutex {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Mutex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").field("state", &self.state()).finish()
    }
}

#[cfg(all(feature = "lock_api", not(all(loom, test))))]
unsafe impl lock_api::RawMutex for Mutex {
    type GuardMarker = lock_api::GuardSend;

    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    #[inline]
    fn lock(&self) {
        Self::lock(self);
    }

    #[inline]
    fn try_lock(&self) -> bool {
        Self::try_lock(self)
    }

    #[inline]
    unsafe fn unlock(&self) {
        Self::unlock(self);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        Self::is_locked(self)
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::{Mutex, State};
    use crate::pool::{CriticalSection, Occupancy};
    use crate::test::lots_and_lots;

    #[test]
    fn smoke() {
        let mutex = Mutex::new();
        mutex.lock();
        mutex.unlock();
        mutex.lock();
        mutex.unlock();
        assert_eq!(mutex.state(), State::Unlocked);
    }

    #[test]
    fn uncontended_lock_stays_locked() {
        let mutex = Mutex::new();
        mutex.lock();
        assert_eq!(mutex.state(), State::Locked);
        mutex.unlock();
        assert_eq!(mutex.state(), State::Unlocked);
    }

    #[test]
    fn test_try_lock() {
        let mutex = Mutex::new();
        assert!(mutex.try_lock());
        assert!(mutex.is_locked());
        assert!(!mutex.try_lock());
        mutex.unlock();
        assert!(!mutex.is_locked());
    }

    #[test]
    fn unlock_unlocked_is_noop() {
        let mutex = Mutex::new();
        mutex.unlock();
        assert_eq!(mutex.state(), State::Unlocked);
    }

    #[test]
    fn waiter_marks_contended() {
        let mutex = Arc::new(Mutex::new());
        mutex.lock();
        let c_mutex = Arc::clone(&mutex);
        let waiter = thread::spawn(move || {
            c_mutex.lock();
            let state = c_mutex.state();
            c_mutex.unlock();
            state
        });
        while mutex.state() != State::Contended {
            thread::sleep(Duration::from_millis(1));
        }
        mutex.unlock();
        // A woken waiter reacquires as contended.
        assert_eq!(waiter.join().unwrap(), State::Contended);
        assert_eq!(mutex.state(), State::Unlocked);
    }

    #[test]
    fn lots_and_lots_lock() {
        const THREADS: usize = 8;
        const ITERS: u64 = 2000;

        let mutex = Mutex::new();
        let probe = Occupancy::new(1);
        lots_and_lots(THREADS, || {
            for _ in 0..ITERS {
                mutex.lock();
                probe.enter(0);
                mutex.unlock();
            }
        });
        assert_eq!(probe.max(), 1);
        assert_eq!(probe.total(), THREADS as u64 * ITERS);
        assert!(!mutex.is_locked());
    }

    #[test]
    fn lots_and_lots_mixed_lock() {
        const THREADS: usize = 4;
        const ITERS: u64 = 1000;

        let mutex = Mutex::new();
        let probe = Occupancy::new(1);
        lots_and_lots(THREADS, || {
            for r in 0..ITERS {
                if r % 2 == 0 {
                    mutex.lock();
                } else {
                    while !mutex.try_lock() {
                        thread::yield_now();
                    }
                }
                probe.enter(0);
                mutex.unlock();
            }
        });
        assert_eq!(probe.max(), 1);
        assert_eq!(probe.total(), THREADS as u64 * ITERS);
    }

    #[test]
    fn test_mutex_debug() {
        let mutex = Mutex::new();
        assert_eq!(format!("{mutex:?}"), "Mutex { state: Unlocked }");
        mutex.lock();
        assert_eq!(format!("{mutex:?}"), "Mutex { state: Locked }");
        mutex.unlock();
    }
}

#[cfg(all(loom, test))]
mod model {
    use crate::loom::models;

    #[test]
    fn lock_join() {
        models::lock_join();
    }

    #[test]
    fn mixed_lock_join() {
        models::mixed_lock_join();
    }
}
