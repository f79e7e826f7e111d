//! Start and stop rendezvous between a controller and its worker threads.
//!
//! A benchmark run needs two synchronization points: no worker may start its
//! timed work before every worker is ready, and the controller may not stop
//! the clock before every worker is done. The [`Rendezvous`] trait captures
//! both points as one capability, so that the harness drives a run the same
//! way whatever the backend is. Two backends are provided:
//!
//! - [`FutexRendezvous`]: a pair of [`Barrier`]s built on futex words, one for
//!   the start and one for the stop of the timed window.
//! - [`Handshake`]: a pair of pipes. Workers write a byte to the "ready" pipe
//!   and block reading from the "go" pipe. The stop of the timed window is
//!   observed by joining the worker threads.

mod futex;
pub use futex::{Barrier, FutexRendezvous};

mod pipe;
pub use pipe::Handshake;

use crate::error::Result;
use crate::pool::Workers;

/// The value a controller hands over to released participants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Token {
    /// Run the timed work.
    Go = 1,
    /// The run is being torn down, skip the timed work and exit.
    Abort = 2,
}

impl Token {
    /// The raw value meaning "not yet released".
    pub(crate) const PENDING: u32 = 0;

    pub(crate) const fn as_raw(self) -> u32 {
        self as u32
    }

    pub(crate) const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Go),
            2 => Some(Self::Abort),
            _ => None,
        }
    }
}

/// A rendezvous of a fixed number of participants with a single controller.
///
/// Participants call [`arrive`] before the timed work and [`depart`] after it.
/// The controller calls, in this order: [`wait_arrived`], [`release`] (or
/// [`abort`]), [`wait_departed`] and finally [`dismiss`] once it has taken
/// its stop timestamp.
///
/// Implementations guarantee that [`wait_arrived`] does not return before
/// every participant called [`arrive`], that no [`arrive`] call returns
/// before the controller releases, and that [`wait_departed`] does not
/// return before every participant finished its timed work.
///
/// [`arrive`]: Rendezvous::arrive
/// [`depart`]: Rendezvous::depart
/// [`wait_arrived`]: Rendezvous::wait_arrived
/// [`release`]: Rendezvous::release
/// [`abort`]: Rendezvous::abort
/// [`wait_departed`]: Rendezvous::wait_departed
/// [`dismiss`]: Rendezvous::dismiss
pub trait Rendezvous: Sync {
    /// Signals readiness and blocks until the controller releases, returning
    /// the release token.
    fn arrive(&self) -> Result<Token>;

    /// Signals that the timed work is done.
    ///
    /// May block until the controller dismisses the participants.
    fn depart(&self) {}

    /// Blocks the controller until every participant has arrived.
    fn wait_arrived(&self) -> Result<()>;

    /// Releases every arrived participant with [`Token::Go`].
    fn release(&self) -> Result<()>;

    /// Releases the first `spawned` participants with [`Token::Abort`].
    ///
    /// Used in place of [`release`] when not all participants could be
    /// started. The controller must not wait for arrivals before aborting.
    ///
    /// [`release`]: Rendezvous::release
    fn abort(&self, spawned: u32) -> Result<()>;

    /// Blocks the controller until every participant finished its timed work.
    ///
    /// Backends without a stop signal of their own join the workers here.
    fn wait_departed(&self, workers: &mut Workers<'_>) -> Result<()>;

    /// Lets departed participants terminate.
    fn dismiss(&self) {}
}

#[cfg(all(not(loom), test))]
pub(crate) mod tests {
    use std::thread;

    use super::{Rendezvous, Token};
    use crate::pool::Workers;
    use crate::test::Passed;

    const PARTICIPANTS: u32 = 6;

    /// Evaluates that the controller's arrival wait covers every participant
    /// and that no participant gets through before the release.
    pub fn release_after_all_arrived<R: Rendezvous>(sync: &R) {
        let arrived = Passed::default();
        let released = Passed::default();
        thread::scope(|s| {
            let mut workers = Workers::with_capacity(PARTICIPANTS as usize).unwrap();
            for _ in 0..PARTICIPANTS {
                let (arrived, released) = (&arrived, &released);
                workers.push(s.spawn(move || {
                    arrived.mark();
                    let token = sync.arrive().unwrap();
                    released.mark();
                    sync.depart();
                    assert_eq!(token, Token::Go);
                    1
                }));
            }
            sync.wait_arrived().unwrap();
            let arrived = arrived.count();
            let early = released.settle();
            sync.release().unwrap();
            sync.wait_departed(&mut workers).unwrap();
            let departed = released.count();
            sync.dismiss();
            workers.join().unwrap();
            assert_eq!(arrived, PARTICIPANTS);
            assert_eq!(early, 0);
            assert_eq!(departed, PARTICIPANTS);
            assert_eq!(workers.executed(), u64::from(PARTICIPANTS));
        });
    }

    /// Evaluates that aborted participants are released with the abort token.
    pub fn abort_spawned<R: Rendezvous>(sync: &R) {
        const SPAWNED: u32 = PARTICIPANTS / 2;
        thread::scope(|s| {
            let mut workers = Workers::with_capacity(SPAWNED as usize).unwrap();
            for _ in 0..SPAWNED {
                workers.push(s.spawn(move || {
                    let token = sync.arrive().unwrap();
                    u64::from(token == Token::Abort)
                }));
            }
            sync.abort(SPAWNED).unwrap();
            workers.join().unwrap();
            assert_eq!(workers.executed(), u64::from(SPAWNED));
        });
    }

    #[test]
    fn token_raw_values() {
        assert_eq!(Token::from_raw(Token::PENDING), None);
        assert_eq!(Token::from_raw(Token::Go.as_raw()), Some(Token::Go));
        assert_eq!(Token::from_raw(Token::Abort.as_raw()), Some(Token::Abort));
        assert_eq!(Token::from_raw(3), None);
    }
}
