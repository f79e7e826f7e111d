//! Locking interfaces for the futex mutex that are compatible with [lock_api].
//!
//! This module exports [`lock_api::Mutex`] and [`lock_api::MutexGuard`] type
//! aliases with the futex [`Mutex`] as their raw lock. The [`Mutex`] type
//! implements the [`lock_api::RawMutex`] trait when this feature is enabled.
//!
//! [`Mutex`]: crate::Mutex
//! [lock_api]: https://crates.io/crates/lock_api
//! [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
//! [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
//! [`lock_api::RawMutex`]: https://docs.rs/lock_api/latest/lock_api/trait.RawMutex.html

use crate::mutex;

/// A [`lock_api::Mutex`] that protects a value of type `T` with a futex
/// mutex.
///
/// # Example
///
/// ```
/// use futex_wait::lock_api::Mutex;
///
/// let mutex = Mutex::new(0);
/// *mutex.lock() += 1;
/// assert_eq!(*mutex.lock(), 1);
/// ```
/// [`lock_api::Mutex`]: https://docs.rs/lock_api/latest/lock_api/struct.Mutex.html
pub type Mutex<T> = lock_api::Mutex<mutex::Mutex, T>;

/// A [`lock_api::MutexGuard`] of a futex mutex.
///
/// [`lock_api::MutexGuard`]: https://docs.rs/lock_api/latest/lock_api/struct.MutexGuard.html
pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, mutex::Mutex, T>;

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::Arc;

    use super::Mutex;
    use crate::test::lots_and_lots;

    #[test]
    fn lots_and_lots_lock() {
        const THREADS: usize = 4;
        const ITERS: u32 = 1000;

        let mutex = Arc::new(Mutex::new(0));
        lots_and_lots(THREADS, || {
            for _ in 0..ITERS {
                *mutex.lock() += 1;
            }
        });
        assert_eq!(*mutex.lock(), ITERS * THREADS as u32);
    }

    #[test]
    fn guard_reports_locked() {
        let mutex = Mutex::new(());
        let guard = mutex.lock();
        assert!(mutex.is_locked());
        assert!(mutex.try_lock().is_none());
        drop(guard);
        assert!(!mutex.is_locked());
    }
}
