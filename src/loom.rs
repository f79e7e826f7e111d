pub mod models {
    use loom::cell::UnsafeCell;
    use loom::sync::atomic::AtomicU32;
    use loom::sync::Arc;
    use loom::{model, thread};

    use core::sync::atomic::Ordering::Relaxed;

    use crate::barrier::{Barrier, Token};
    use crate::mutex::Mutex;

    // Three or more threads make lock models run for too long.
    const LOCKS: usize = 2;

    /// A counter protected by a raw futex mutex. Loom tracks every access to
    /// the cell and reports one that is not ordered by the lock.
    struct Counter {
        lock: Mutex,
        value: UnsafeCell<u32>,
    }

    // SAFETY: `value` is only accessed while `lock` is held.
    unsafe impl Sync for Counter {}

    impl Counter {
        fn new() -> Self {
            Self { lock: Mutex::new(), value: UnsafeCell::new(0) }
        }

        fn inc(&self) {
            self.lock.lock();
            // SAFETY: The lock is held.
            self.value.with_mut(|value| unsafe { *value += 1 });
            self.lock.unlock();
        }

        fn try_inc(&self) {
            if self.lock.try_lock() {
                // SAFETY: The lock is held.
                self.value.with_mut(|value| unsafe { *value += 1 });
                self.lock.unlock();
            }
        }

        fn get(&self) -> u32 {
            self.lock.lock();
            // SAFETY: The lock is held.
            let value = self.value.with(|value| unsafe { *value });
            self.lock.unlock();
            value
        }
    }

    /// Evaluates that concurrent `lock` calls serialize all mutations
    /// against the shared data, therefore no data races.
    pub fn lock_join() {
        model(|| {
            let counter = Arc::new(Counter::new());
            let handles: Vec<_> = (0..LOCKS)
                .map(|_| {
                    let counter = Arc::clone(&counter);
                    thread::spawn(move || counter.inc())
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(counter.get(), LOCKS as u32);
            assert!(!counter.lock.is_locked());
        });
    }

    /// Evaluates that concurrent `lock` and `try_lock` calls serialize all
    /// mutations against the shared data, therefore no data races.
    pub fn mixed_lock_join() {
        model(|| {
            let counter = Arc::new(Counter::new());
            let handles: Vec<_> = (0..LOCKS)
                .map(|run| {
                    let counter = Arc::clone(&counter);
                    let f = if run % 2 == 0 { Counter::inc } else { Counter::try_inc };
                    thread::spawn(move || f(&*counter))
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            assert!((1..=LOCKS as u32).contains(&counter.get()));
        });
    }

    /// Evaluates that the controller only observes full arrival and that no
    /// participant gets through before the release.
    pub fn barrier_release() {
        model(|| {
            let barrier = Arc::new(Barrier::new(LOCKS as u32));
            let released = Arc::new(AtomicU32::new(0));
            let handles: Vec<_> = (0..LOCKS)
                .map(|_| {
                    let (barrier, released) = (Arc::clone(&barrier), Arc::clone(&released));
                    thread::spawn(move || {
                        let token = barrier.arrive_and_wait();
                        released.fetch_add(1, Relaxed);
                        token
                    })
                })
                .collect();
            barrier.wait_for_all();
            assert_eq!(barrier.remaining(), 0);
            assert_eq!(released.load(Relaxed), 0);
            barrier.release(Token::Go);
            for handle in handles {
                assert_eq!(handle.join().unwrap(), Token::Go);
            }
        });
    }
}
