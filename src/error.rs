//! Errors that abort a benchmark run.
//!
//! None of these are recoverable: a run that failed half way carries no
//! valid timing, so callers are expected to report the error and exit.

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::io;

/// The error type of a benchmark run.
#[derive(Debug)]
pub enum Error {
    /// The configuration asks for zero worker threads.
    ZeroThreads,
    /// The configuration asks for zero futexes.
    ZeroFutexes,
    /// The thread count is not a multiple of the futex count.
    UnevenFutexes {
        /// Configured worker thread count.
        threads: u32,
        /// Configured futex count.
        futexes: u32,
    },
    /// An allocation for the named structure failed.
    Alloc {
        /// The structure being allocated.
        what: &'static str,
    },
    /// The handshake channels could not be created.
    Channel(io::Error),
    /// A worker thread could not be spawned.
    Spawn {
        /// Index of the worker that failed to spawn.
        worker: u32,
        /// The underlying OS error.
        source: io::Error,
    },
    /// A read or write on the handshake channels failed or came up short.
    Handshake {
        /// The failed operation.
        op: &'static str,
        /// The underlying OS error.
        source: io::Error,
    },
    /// The process CPU time could not be read.
    Clock(io::Error),
    /// A worker thread panicked.
    WorkerPanicked,
    /// The measured window is too short for the wall clock to register it.
    ZeroElapsed,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroThreads => f.write_str("threads must be at least 1"),
            Self::ZeroFutexes => f.write_str("futexes must be at least 1"),
            Self::UnevenFutexes { threads, futexes } => {
                write!(f, "threads % futexes must be 0 (got {threads} threads and {futexes} futexes)")
            }
            Self::Alloc { what } => write!(f, "allocation for {what} failed"),
            Self::Channel(err) => write!(f, "pipe() for handshake channels failed: {err}"),
            Self::Spawn { worker, source } => {
                write!(f, "spawning worker {worker} failed: {source}")
            }
            Self::Handshake { op, source } => write!(f, "{op} failed: {source}"),
            Self::Clock(err) => write!(f, "getrusage() failed: {err}"),
            Self::WorkerPanicked => f.write_str("a worker thread panicked"),
            Self::ZeroElapsed => f.write_str("elapsed wall time is zero, raise the iteration count"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Channel(err) | Self::Clock(err) => Some(err),
            Self::Spawn { source, .. } | Self::Handshake { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type of a benchmark run.
pub type Result<T> = core::result::Result<T, Error>;

/// Terminates the process after an error that leaves the timing window out of
/// sync between the controller and some worker.
///
/// A worker has no way to hand such an error back to a controller that is
/// blocked waiting on it, and a controller that cannot release its workers
/// cannot join them either.
pub(crate) fn desync(err: &Error) -> ! {
    tracing::error!(%err, "controller and workers lost sync");
    std::process::exit(1)
}

#[cfg(test)]
mod test {
    use std::error::Error as _;
    use std::io;

    use super::Error;

    #[test]
    fn uneven_futexes_message() {
        let err = Error::UnevenFutexes { threads: 10, futexes: 3 };
        assert_eq!(
            err.to_string(),
            "threads % futexes must be 0 (got 10 threads and 3 futexes)"
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn handshake_has_source() {
        let source = io::Error::from(io::ErrorKind::UnexpectedEof);
        let err = Error::Handshake { op: "read() on go channel", source };
        assert!(err.to_string().starts_with("read() on go channel failed: "));
        assert!(err.source().is_some());
    }
}
