//! The benchmark harness.
//!
//! A run spawns `threads` workers, each one assigned a mutex out of a pool of
//! `futexes`, and measures how long it takes them to lock and unlock their
//! mutexes `iterations` times in total. The timed window is bracketed by a
//! [`Rendezvous`]: the clock starts right before the workers are released and
//! stops right after the last one is done.

use std::thread::{self, Scope};

use crate::barrier::{FutexRendezvous, Handshake, Rendezvous};
use crate::error::{desync, Error, Result};
use crate::pool::{CriticalSection, FutexPool, Worker, Workers};
use crate::report::{Format, Report};
use crate::time::{Snapshot, Timing};

/// How the controller synchronizes with workers at the edges of the timed
/// window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    /// Start and stop barriers built on futex words.
    Futex,
    /// A byte handshake over pipes to start, joining the threads to stop.
    #[default]
    Handshake,
}

/// The configuration of a benchmark run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Total number of lock and unlock pairs, split evenly among workers.
    pub iterations: u64,
    /// Number of worker threads.
    pub threads: u32,
    /// Number of futexes the workers are spread over.
    pub futexes: u32,
    /// Start and stop synchronization backend.
    pub backend: Backend,
    /// Report format.
    pub format: Format,
}

impl Config {
    /// The default total iteration count.
    pub const ITERATIONS: u64 = 100_000_000;
    /// The default thread count.
    pub const THREADS: u32 = 256;
    /// The default futex count.
    pub const FUTEXES: u32 = 1;

    /// Checks that the workers can be spread evenly over the futexes.
    ///
    /// # Examples
    ///
    /// ```
    /// use futex_wait::bench::Config;
    ///
    /// let config = Config { threads: 10, futexes: 2, ..Config::default() };
    /// assert!(config.validate().is_ok());
    ///
    /// let config = Config { threads: 10, futexes: 3, ..Config::default() };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        let Self { threads, futexes, .. } = *self;
        if threads == 0 {
            return Err(Error::ZeroThreads);
        }
        if futexes == 0 {
            return Err(Error::ZeroFutexes);
        }
        if threads % futexes != 0 {
            return Err(Error::UnevenFutexes { threads, futexes });
        }
        Ok(())
    }

    /// Returns the number of iterations each worker runs.
    pub fn per_worker(&self) -> u64 {
        self.iterations / u64::from(self.threads.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iterations: Self::ITERATIONS,
            threads: Self::THREADS,
            futexes: Self::FUTEXES,
            backend: Backend::default(),
            format: Format::default(),
        }
    }
}

/// What a completed run measured.
#[derive(Clone, Copy, Debug)]
pub struct Outcome {
    /// Lock and unlock pairs the workers actually executed.
    pub executed: u64,
    /// Time elapsed over the timed window.
    pub timing: Timing,
}

impl Outcome {
    /// Derives the throughput report of this run.
    ///
    /// Returns [`Error::ZeroElapsed`] if the window was too short to measure.
    pub fn report(&self, config: &Config) -> Result<Report> {
        Report::new(config.threads, config.futexes, config.iterations, self.timing)
    }
}

/// Runs the benchmark described by `config`.
///
/// # Examples
///
/// ```
/// use futex_wait::bench::{self, Backend, Config};
///
/// let config = Config { iterations: 4000, threads: 4, futexes: 2, ..Config::default() };
/// let outcome = bench::run(&config).unwrap();
/// assert_eq!(outcome.executed, 4000);
/// ```
pub fn run(config: &Config) -> Result<Outcome> {
    run_with(config, &())
}

/// Runs the benchmark described by `config`, executing `section` inside every
/// critical section.
pub fn run_with<C: CriticalSection>(config: &Config, section: &C) -> Result<Outcome> {
    config.validate()?;
    match config.backend {
        Backend::Futex => measure(config, &FutexRendezvous::new(config.threads), section),
        Backend::Handshake => measure(config, &Handshake::new(config.threads)?, section),
    }
}

fn measure<R, C>(config: &Config, sync: &R, section: &C) -> Result<Outcome>
where
    R: Rendezvous,
    C: CriticalSection,
{
    let pool = FutexPool::new(config.futexes)?;
    let workers = pool.workers(config.threads, config.iterations)?;
    tracing::debug!(
        threads = config.threads,
        futexes = config.futexes,
        per_worker = config.per_worker(),
        backend = ?config.backend,
        "allocated futex pool and worker contexts"
    );
    if config.per_worker() == 0 {
        tracing::warn!(
            iterations = config.iterations,
            threads = config.threads,
            "fewer iterations than threads, workers will not lock at all"
        );
    } else if config.iterations % u64::from(config.threads) != 0 {
        tracing::warn!(
            iterations = config.iterations,
            executed = config.per_worker() * u64::from(config.threads),
            "iterations do not split evenly among threads, the remainder is dropped"
        );
    }

    thread::scope(|s| {
        let mut running = spawn_all(s, &workers, sync, section)?;

        let start = sync.wait_arrived().and_then(|()| {
            let start = Snapshot::now()?;
            sync.release()?;
            Ok(start)
        });
        let start = match start {
            Ok(start) => start,
            Err(err) => return Err(abort(sync, &mut running, config.threads, err)),
        };
        sync.wait_departed(&mut running)?;
        let stop = Snapshot::now();
        sync.dismiss();
        running.join()?;
        let stop = stop?;

        let timing = Timing::between(&start, &stop);
        let executed = running.executed();
        tracing::info!(executed, wall = ?timing.wall, "timed window closed");
        Ok(Outcome { executed, timing })
    })
}

/// Spawns one thread per worker context.
///
/// If some thread fails to spawn, the ones already running are released with
/// the abort token and joined before the error is returned.
fn spawn_all<'scope, 'env, R, C>(
    scope: &'scope Scope<'scope, 'env>,
    workers: &'env [Worker<'env>],
    sync: &'env R,
    section: &'env C,
) -> Result<Workers<'scope>>
where
    R: Rendezvous,
    C: CriticalSection,
{
    let mut running = Workers::with_capacity(workers.len())?;
    for worker in workers {
        let spawned = thread::Builder::new()
            .name(format!("futex-worker-{}", worker.id()))
            .spawn_scoped(scope, move || worker.run(sync, section));
        match spawned {
            Ok(handle) => running.push(handle),
            Err(source) => {
                let err = Error::Spawn { worker: worker.id(), source };
                return Err(abort(sync, &mut running, worker.id(), err));
            }
        }
    }
    tracing::debug!(spawned = running.running(), "spawned workers");
    Ok(running)
}

/// Tears a run down before its timed window opens: releases the `spawned`
/// workers with the abort token and joins them, then hands `err` back.
///
/// Workers that cannot be released would keep the thread scope from ever
/// returning, so failing to abort terminates the process.
fn abort<R: Rendezvous>(sync: &R, running: &mut Workers<'_>, spawned: u32, err: Error) -> Error {
    tracing::error!(%err, spawned, "aborting run");
    if let Err(failed) = sync.abort(spawned) {
        desync(&failed);
    }
    match running.join() {
        Ok(()) => err,
        Err(join) => join,
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::io;

    use super::{measure, run, run_with, Backend, Config};
    use crate::barrier::{Handshake, Rendezvous, Token};
    use crate::error::{Error, Result};
    use crate::pool::{Occupancy, Workers};

    fn config(iterations: u64, threads: u32, futexes: u32, backend: Backend) -> Config {
        Config { iterations, threads, futexes, backend, ..Config::default() }
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.iterations, 100_000_000);
        assert_eq!(config.threads, 256);
        assert_eq!(config.futexes, 1);
        assert_eq!(config.backend, Backend::Handshake);
    }

    #[test]
    fn rejects_zero_counts() {
        let zero_threads = config(10, 0, 1, Backend::Futex);
        assert!(matches!(zero_threads.validate(), Err(Error::ZeroThreads)));
        let zero_futexes = config(10, 1, 0, Backend::Futex);
        assert!(matches!(zero_futexes.validate(), Err(Error::ZeroFutexes)));
    }

    #[test]
    fn rejects_uneven_futexes_before_running() {
        let probe = Occupancy::new(3);
        let err = run_with(&config(1000, 10, 3, Backend::Futex), &probe).unwrap_err();
        assert!(matches!(err, Error::UnevenFutexes { threads: 10, futexes: 3 }));
        assert_eq!(probe.total(), 0);
    }

    #[test]
    fn fewer_iterations_than_threads() {
        for backend in [Backend::Futex, Backend::Handshake] {
            let outcome = run(&config(3, 4, 1, backend)).unwrap();
            assert_eq!(outcome.executed, 0);
        }
    }

    #[test]
    fn remainder_is_dropped() {
        let outcome = run(&config(10, 4, 2, Backend::Handshake)).unwrap();
        assert_eq!(outcome.executed, 8);
    }

    /// Where [`Faulty`] fails on the controller side.
    #[derive(Clone, Copy)]
    enum Fault {
        WaitArrived,
        Release,
    }

    /// A handshake whose controller side fails at one step.
    struct Faulty {
        inner: Handshake,
        fault: Fault,
    }

    impl Faulty {
        fn error(op: &'static str) -> Error {
            Error::Handshake { op, source: io::Error::from(io::ErrorKind::BrokenPipe) }
        }
    }

    impl Rendezvous for Faulty {
        fn arrive(&self) -> Result<Token> {
            self.inner.arrive()
        }

        fn wait_arrived(&self) -> Result<()> {
            match self.fault {
                Fault::WaitArrived => Err(Self::error("read() for ready")),
                Fault::Release => self.inner.wait_arrived(),
            }
        }

        fn release(&self) -> Result<()> {
            match self.fault {
                Fault::WaitArrived => self.inner.release(),
                Fault::Release => Err(Self::error("write() for waking up workers")),
            }
        }

        fn abort(&self, spawned: u32) -> Result<()> {
            self.inner.abort(spawned)
        }

        fn wait_departed(&self, workers: &mut Workers<'_>) -> Result<()> {
            self.inner.wait_departed(workers)
        }
    }

    #[test]
    fn controller_failure_aborts_workers() {
        for fault in [Fault::WaitArrived, Fault::Release] {
            let config = config(100, 4, 1, Backend::Handshake);
            let sync = Faulty { inner: Handshake::new(config.threads).unwrap(), fault };
            let probe = Occupancy::new(1);
            let err = measure(&config, &sync, &probe).unwrap_err();
            assert!(matches!(err, Error::Handshake { .. }));
            assert_eq!(probe.total(), 0);
        }
    }

    #[test]
    fn mutual_exclusion_per_futex() {
        for backend in [Backend::Futex, Backend::Handshake] {
            let probe = Occupancy::new(4);
            let outcome = run_with(&config(40_000, 16, 4, backend), &probe).unwrap();
            assert_eq!(probe.max(), 1);
            assert_eq!(probe.total(), 40_000);
            assert_eq!(outcome.executed, 40_000);
        }
    }
}
