//! The futex pool and the worker contexts of a benchmark run.
//!
//! All the state a run shares between threads is owned by the controller and
//! allocated up front: a [`FutexPool`] with one [`Mutex`] per futex, and one
//! [`Worker`] context per thread that borrows its mutex from the pool. The
//! contexts are handed to scoped threads, so nothing outlives the run and
//! nothing is global.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread::ScopedJoinHandle;

use crate::barrier::{Rendezvous, Token};
use crate::error::{desync, Error, Result};
use crate::mutex::Mutex;

/// Work executed while holding a worker's mutex.
///
/// The benchmark measures bare lock and unlock pairs and uses the no-op
/// implementation for `()`. Other implementations instrument the critical
/// section, see [`Occupancy`].
pub trait CriticalSection: Sync {
    /// Runs inside the critical section of the mutex at pool index `slot`.
    fn enter(&self, slot: usize);
}

impl CriticalSection for () {
    #[inline(always)]
    fn enter(&self, _slot: usize) {}
}

/// A critical section that counts its occupants.
///
/// Tracks, for every pool slot, how many threads are inside the critical
/// section at once, keeping the highest count ever observed. Under a correct
/// mutex that maximum is `1`. Also counts the total number of entries.
///
/// # Examples
///
/// ```
/// use futex_wait::pool::{CriticalSection, Occupancy};
///
/// let probe = Occupancy::new(2);
/// probe.enter(0);
/// probe.enter(1);
/// assert_eq!(probe.max(), 1);
/// assert_eq!(probe.total(), 2);
/// ```
#[derive(Debug)]
pub struct Occupancy {
    inside: Box<[AtomicU32]>,
    max: AtomicU32,
    total: AtomicU64,
}

impl Occupancy {
    /// Creates a probe for a pool of `slots` mutexes.
    #[must_use]
    pub fn new(slots: usize) -> Self {
        let inside = (0..slots).map(|_| AtomicU32::new(0)).collect();
        Self { inside, max: AtomicU32::new(0), total: AtomicU64::new(0) }
    }

    /// Returns the highest number of simultaneous occupants of any slot.
    pub fn max(&self) -> u32 {
        self.max.load(Ordering::SeqCst)
    }

    /// Returns how many times the critical section was entered.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

impl CriticalSection for Occupancy {
    fn enter(&self, slot: usize) {
        let inside = &self.inside[slot];
        let occupants = inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(occupants, Ordering::SeqCst);
        core::hint::spin_loop();
        self.total.fetch_add(1, Ordering::Relaxed);
        inside.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An ordered collection of mutexes, each built on its own futex word.
#[derive(Debug)]
pub struct FutexPool {
    mutexes: Box<[Mutex]>,
}

impl FutexPool {
    /// Allocates a pool of `futexes` unlocked mutexes.
    ///
    /// Returns [`Error::Alloc`] if the allocation fails.
    pub fn new(futexes: u32) -> Result<Self> {
        let mut mutexes = Vec::new();
        mutexes
            .try_reserve_exact(futexes as usize)
            .map_err(|_| Error::Alloc { what: "futexes" })?;
        mutexes.extend((0..futexes).map(|_| Mutex::new()));
        Ok(Self { mutexes: mutexes.into_boxed_slice() })
    }

    /// Returns the number of mutexes in the pool.
    pub fn len(&self) -> usize {
        self.mutexes.len()
    }

    /// Returns `true` if the pool has no mutexes.
    pub fn is_empty(&self) -> bool {
        self.mutexes.is_empty()
    }

    /// Returns the pool index assigned to worker `id`.
    ///
    /// # Panics
    ///
    /// Panics if the pool is empty.
    pub fn slot_of(&self, id: u32) -> usize {
        id as usize % self.mutexes.len()
    }

    /// Returns the mutex at pool index `slot`.
    pub fn get(&self, slot: usize) -> Option<&Mutex> {
        self.mutexes.get(slot)
    }

    /// Allocates one context per worker, assigning worker `i` to the mutex
    /// at index `i % len`. Each worker gets an equal share of `iterations`.
    ///
    /// Returns [`Error::ZeroFutexes`] if the pool is empty and
    /// [`Error::Alloc`] if the allocation fails.
    pub fn workers(&self, threads: u32, iterations: u64) -> Result<Vec<Worker<'_>>> {
        if self.is_empty() {
            return Err(Error::ZeroFutexes);
        }
        let share = iterations / u64::from(threads.max(1));
        let mut workers = Vec::new();
        workers
            .try_reserve_exact(threads as usize)
            .map_err(|_| Error::Alloc { what: "worker contexts" })?;
        workers.extend((0..threads).map(|id| {
            let slot = self.slot_of(id);
            Worker { id, slot, mutex: &self.mutexes[slot], iterations: share }
        }));
        Ok(workers)
    }
}

/// The context of one worker thread.
///
/// Written once by the controller before the thread is spawned, read-only
/// afterwards.
#[derive(Debug)]
pub struct Worker<'a> {
    id: u32,
    slot: usize,
    mutex: &'a Mutex,
    iterations: u64,
}

impl Worker<'_> {
    /// Returns the worker's id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the pool index of the worker's mutex.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Returns the number of lock and unlock pairs this worker runs.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Runs the worker: waits for the start of the timed window, locks and
    /// unlocks its mutex for its share of iterations, then signals it is
    /// done. Returns the number of executed iterations.
    ///
    /// A failed handshake leaves the controller waiting on a worker that will
    /// never show up, so it terminates the process.
    pub fn run<R: Rendezvous, C: CriticalSection>(&self, sync: &R, section: &C) -> u64 {
        let token = match sync.arrive() {
            Ok(token) => token,
            Err(err) => desync(&err),
        };
        if token == Token::Abort {
            return 0;
        }
        let _departure = Departure(sync);
        for _ in 0..self.iterations {
            self.mutex.lock();
            let _locked = Locked(self.mutex);
            section.enter(self.slot);
        }
        self.iterations
    }
}

/// Unlocks the held mutex when dropped, also while unwinding out of a
/// panicking critical section.
struct Locked<'a>(&'a Mutex);

impl Drop for Locked<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        self.0.unlock();
    }
}

/// Signals the end of a worker's timed work when dropped, so that a panicking
/// worker still counts as departed and the controller gets to join it.
struct Departure<'a, R: Rendezvous>(&'a R);

impl<R: Rendezvous> Drop for Departure<'_, R> {
    fn drop(&mut self) {
        self.0.depart();
    }
}

/// The running worker threads of a benchmark run.
#[derive(Debug)]
pub struct Workers<'scope> {
    handles: Vec<ScopedJoinHandle<'scope, u64>>,
    executed: u64,
}

impl<'scope> Workers<'scope> {
    /// Allocates room for `threads` join handles.
    ///
    /// Returns [`Error::Alloc`] if the allocation fails.
    pub fn with_capacity(threads: usize) -> Result<Self> {
        let mut handles = Vec::new();
        handles.try_reserve_exact(threads).map_err(|_| Error::Alloc { what: "thread handles" })?;
        Ok(Self { handles, executed: 0 })
    }

    /// Adds a running worker thread.
    pub fn push(&mut self, handle: ScopedJoinHandle<'scope, u64>) {
        self.handles.push(handle);
    }

    /// Returns the number of running (not yet joined) worker threads.
    pub fn running(&self) -> usize {
        self.handles.len()
    }

    /// Joins every running worker thread, adding up their executed
    /// iterations.
    ///
    /// Returns [`Error::WorkerPanicked`] if a worker panicked. Calling this
    /// again after all workers have been joined is a no-op.
    pub fn join(&mut self) -> Result<()> {
        for handle in self.handles.drain(..) {
            self.executed += handle.join().map_err(|_| Error::WorkerPanicked)?;
        }
        Ok(())
    }

    /// Returns the iterations executed by the joined workers.
    pub fn executed(&self) -> u64 {
        self.executed
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::{CriticalSection, FutexPool, Occupancy, Workers};
    use crate::barrier::{FutexRendezvous, Rendezvous};
    use crate::error::Error;

    #[test]
    fn workers_round_robin_over_pool() {
        let pool = FutexPool::new(3).unwrap();
        let workers = pool.workers(9, 900).unwrap();
        assert_eq!(workers.len(), 9);
        for (i, worker) in workers.iter().enumerate() {
            assert_eq!(worker.id() as usize, i);
            assert_eq!(worker.slot(), i % 3);
            assert_eq!(worker.iterations(), 100);
        }
    }

    #[test]
    fn workers_share_rounds_down() {
        let pool = FutexPool::new(1).unwrap();
        let workers = pool.workers(4, 10).unwrap();
        assert!(workers.iter().all(|w| w.iterations() == 2));
    }

    #[test]
    fn pool_mutexes_start_unlocked() {
        let pool = FutexPool::new(4).unwrap();
        assert_eq!(pool.len(), 4);
        assert!(!pool.is_empty());
        assert!((0..4).all(|slot| !pool.get(slot).unwrap().is_locked()));
        assert!(pool.get(4).is_none());
    }

    #[test]
    fn empty_pool_has_no_workers() {
        let pool = FutexPool::new(0).unwrap();
        assert!(matches!(pool.workers(4, 100), Err(Error::ZeroFutexes)));
    }

    #[test]
    fn occupancy_counts_entries() {
        let probe = Occupancy::new(1);
        for _ in 0..10 {
            probe.enter(0);
        }
        assert_eq!(probe.max(), 1);
        assert_eq!(probe.total(), 10);
    }

    /// Panics on the first entry into slot 0.
    struct PanicOnce(AtomicBool);

    impl CriticalSection for PanicOnce {
        fn enter(&self, slot: usize) {
            if slot == 0 && !self.0.swap(true, Ordering::Relaxed) {
                panic!("critical section failed");
            }
        }
    }

    #[test]
    fn panicking_section_releases_lock_and_departs() {
        let pool = FutexPool::new(1).unwrap();
        let workers = pool.workers(2, 20).unwrap();
        let sync = FutexRendezvous::new(2);
        let section = PanicOnce(AtomicBool::new(false));
        thread::scope(|s| {
            let mut running = Workers::with_capacity(2).unwrap();
            for worker in &workers {
                let (sync, section) = (&sync, &section);
                running.push(s.spawn(move || worker.run(sync, section)));
            }
            sync.wait_arrived().unwrap();
            sync.release().unwrap();
            sync.wait_departed(&mut running).unwrap();
            sync.dismiss();
            assert!(matches!(running.join(), Err(Error::WorkerPanicked)));
        });
        assert!(!pool.get(0).unwrap().is_locked());
    }

    #[test]
    fn unit_section_is_noop() {
        ().enter(0);
    }
}
