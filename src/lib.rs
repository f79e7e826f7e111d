//! A futex based mutual exclusion lock and a harness that measures its
//! throughput when many threads contend on a few locks.
//!
//! The [`Mutex`] in this crate is the classic three state futex lock: a 32 bit
//! word that is either unlocked, locked with no waiters, or locked with
//! possible waiters. Threads that lose the race for the lock go to sleep in
//! the kernel on the lock word itself, and the owner only issues a wake up
//! system call when the word says somebody might be sleeping. The uncontended
//! path is a single compare and swap in both directions.
//!
//! The [`bench`] module drives that lock hard: it spawns a number of worker
//! threads, spreads them evenly over a [`pool`] of mutexes, and has every
//! worker lock and unlock its mutex in a tight loop. A [`barrier`] holds all
//! workers at the starting line until the controller takes its first clock
//! reading, and tells the controller when the last worker crossed the finish
//! line. The elapsed wall clock and CPU [`time`] are then turned into a
//! throughput [`report`].
//!
//! ## Use cases
//!
//! The lock is a good fit for short critical sections in programs that target
//! Linux or other platforms where [`atomic-wait`] has a native futex like
//! primitive. The harness answers how that lock scales as the ratio of
//! threads to locks changes, and how much of the time goes into the kernel.
//!
//! ## Raw locking
//!
//! [`Mutex`] is a raw lock: it protects no data, callers pair [`Mutex::lock`]
//! with [`Mutex::unlock`] themselves.
//!
//! ```
//! use futex_wait::Mutex;
//!
//! let mutex = Mutex::new();
//! mutex.lock();
//! assert!(mutex.is_locked());
//! assert!(!mutex.try_lock());
//! mutex.unlock();
//! assert!(!mutex.is_locked());
//! ```
//!
//! ## Running the benchmark
//!
//! ```
//! use futex_wait::bench::{self, Config};
//!
//! let config = Config { iterations: 10_000, threads: 8, futexes: 2, ..Config::default() };
//! let outcome = bench::run(&config).unwrap();
//! assert_eq!(outcome.executed, 10_000);
//! ```
//!
//! ## Features
//!
//! This crate does not provide any default features. Features that can be
//! enabled are:
//!
//! ### lock_api
//!
//! This feature implements the [`RawMutex`] trait from the [lock_api] crate
//! for [`Mutex`]. Aliases are provided by the [`lock_api`] module.
//!
//! [`atomic-wait`]: https://crates.io/crates/atomic-wait
//! [lock_api]: https://crates.io/crates/lock_api
//! [`RawMutex`]: https://docs.rs/lock_api/latest/lock_api/trait.RawMutex.html
//! [`lock_api`]: crate::lock_api

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod cfg;
mod mutex;

pub mod barrier;
pub mod bench;
pub mod error;
pub mod futex;
pub mod pool;
pub mod report;
pub mod time;

pub use error::{Error, Result};
pub use futex::FutexWord;
pub use mutex::{Mutex, State};

#[cfg(feature = "lock_api")]
#[cfg_attr(docsrs, doc(cfg(feature = "lock_api")))]
pub mod lock_api;

#[cfg(all(not(loom), test))]
pub(crate) mod test;

#[cfg(all(loom, test))]
pub(crate) mod loom;
