use core::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};

use crate::barrier::{Rendezvous, Token};
use crate::error::Result;
use crate::futex::FutexWord;
use crate::pool::Workers;

/// A single-use barrier between a fixed number of participants and one
/// controller, built on two futex words.
///
/// Participants count themselves down on one word and then sleep on a second
/// word until the controller stores a release token there. The controller
/// sleeps on the count until it reaches zero. Each word has its own set of
/// waiters, so the last participant to arrive wakes only the controller and
/// the release wakes only the participants.
///
/// # Examples
///
/// ```
/// use std::thread;
///
/// use futex_wait::barrier::{Barrier, Token};
///
/// let barrier = Barrier::new(2);
/// thread::scope(|s| {
///     let a = s.spawn(|| barrier.arrive_and_wait());
///     let b = s.spawn(|| barrier.arrive_and_wait());
///     barrier.wait_for_all();
///     barrier.release(Token::Go);
///     assert_eq!(a.join().unwrap(), Token::Go);
///     assert_eq!(b.join().unwrap(), Token::Go);
/// });
/// ```
#[derive(Debug)]
pub struct Barrier {
    remaining: FutexWord,
    token: FutexWord,
}

impl Barrier {
    /// Creates a new barrier for `participants` participants.
    #[cfg(not(all(loom, test)))]
    #[must_use]
    #[inline]
    pub const fn new(participants: u32) -> Self {
        let remaining = FutexWord::new(participants);
        let token = FutexWord::new(Token::PENDING);
        Self { remaining, token }
    }

    /// Creates a new barrier with Loom primitives (non-const).
    #[cfg(all(loom, test))]
    #[cfg(not(tarpaulin_include))]
    pub fn new(participants: u32) -> Self {
        let remaining = FutexWord::new(participants);
        let token = FutexWord::new(Token::PENDING);
        Self { remaining, token }
    }

    /// Counts the calling participant as arrived and blocks until the
    /// controller releases the barrier, returning the release token.
    ///
    /// The last participant to arrive wakes the controller.
    pub fn arrive_and_wait(&self) -> Token {
        if self.remaining.fetch_sub(1, AcqRel) == 1 {
            self.remaining.wake_one();
        }
        loop {
            if let Some(token) = Token::from_raw(self.token.load(Acquire)) {
                return token;
            }
            self.token.wait(Token::PENDING);
        }
    }

    /// Blocks the controller until every participant has arrived.
    pub fn wait_for_all(&self) {
        loop {
            let remaining = self.remaining.load(Acquire);
            if remaining == 0 {
                return;
            }
            self.remaining.wait(remaining);
        }
    }

    /// Stores `token` and wakes every blocked participant.
    ///
    /// A barrier is released at most once, further calls keep the first
    /// token. Participants that arrive after the release do not block.
    pub fn release(&self, token: Token) {
        let previous = self.token.compare_exchange(Token::PENDING, token.as_raw(), Release);
        debug_assert_eq!(previous, Token::PENDING, "barrier released twice");
        self.token.wake_all();
    }

    /// Returns the number of participants that have not arrived yet.
    ///
    /// This function does not guarantee strong ordering, only atomicity.
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Relaxed)
    }
}

/// The futex backend of [`Rendezvous`]: a start [`Barrier`] and a stop
/// [`Barrier`].
///
/// Workers stay parked on the stop barrier after their timed work, the
/// controller lets them go with [`dismiss`] after its stop timestamp.
///
/// [`dismiss`]: Rendezvous::dismiss
#[derive(Debug)]
pub struct FutexRendezvous {
    start: Barrier,
    stop: Barrier,
}

impl FutexRendezvous {
    /// Creates the start and stop barriers for `participants` workers.
    #[must_use]
    pub fn new(participants: u32) -> Self {
        Self { start: Barrier::new(participants), stop: Barrier::new(participants) }
    }
}

impl Rendezvous for FutexRendezvous {
    fn arrive(&self) -> Result<Token> {
        Ok(self.start.arrive_and_wait())
    }

    fn depart(&self) {
        self.stop.arrive_and_wait();
    }

    fn wait_arrived(&self) -> Result<()> {
        self.start.wait_for_all();
        Ok(())
    }

    fn release(&self) -> Result<()> {
        self.start.release(Token::Go);
        Ok(())
    }

    fn abort(&self, _spawned: u32) -> Result<()> {
        self.start.release(Token::Abort);
        Ok(())
    }

    fn wait_departed(&self, _workers: &mut Workers<'_>) -> Result<()> {
        self.stop.wait_for_all();
        Ok(())
    }

    fn dismiss(&self) {
        self.stop.release(Token::Go);
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::thread;

    use super::{Barrier, FutexRendezvous};
    use crate::barrier::{tests, Token};
    use crate::test::Passed;

    #[test]
    fn release_after_all_arrived() {
        tests::release_after_all_arrived(&FutexRendezvous::new(6));
    }

    #[test]
    fn abort_spawned() {
        tests::abort_spawned(&FutexRendezvous::new(6));
    }

    #[test]
    fn wait_for_all_blocks_on_missing_participant() {
        let barrier = Barrier::new(3);
        let done = Passed::default();
        thread::scope(|s| {
            let a = s.spawn(|| barrier.arrive_and_wait());
            let b = s.spawn(|| barrier.arrive_and_wait());
            s.spawn(|| {
                barrier.wait_for_all();
                done.mark();
            });
            let early = done.settle();
            let c = s.spawn(|| barrier.arrive_and_wait());
            while done.count() == 0 {
                thread::yield_now();
            }
            barrier.release(Token::Go);
            assert_eq!(early, 0);
            for handle in [a, b, c] {
                assert_eq!(handle.join().unwrap(), Token::Go);
            }
        });
        assert_eq!(barrier.remaining(), 0);
    }

    #[test]
    fn late_arrival_does_not_block() {
        let barrier = Barrier::new(1);
        barrier.release(Token::Abort);
        assert_eq!(barrier.arrive_and_wait(), Token::Abort);
    }

    #[test]
    fn single_participant() {
        let barrier = Barrier::new(1);
        thread::scope(|s| {
            let handle = s.spawn(|| barrier.arrive_and_wait());
            barrier.wait_for_all();
            barrier.release(Token::Go);
            assert_eq!(handle.join().unwrap(), Token::Go);
        });
    }
}

#[cfg(all(loom, test))]
mod model {
    use crate::loom::models;

    #[test]
    fn barrier_release() {
        models::barrier_release();
    }
}
