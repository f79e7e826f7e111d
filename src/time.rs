//! Wall clock and process CPU time snapshots.

use std::io;
use std::mem::MaybeUninit;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// A point in time, both on the wall clock and on the process CPU clocks.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot {
    wall: Instant,
    user: Duration,
    system: Duration,
}

impl Snapshot {
    /// Takes a snapshot of the wall clock and the CPU time consumed so far by
    /// all threads of this process.
    ///
    /// Returns [`Error::Clock`] if the CPU time could not be read.
    pub fn now() -> Result<Self> {
        let mut usage = MaybeUninit::<libc::rusage>::uninit();
        // SAFETY: `usage` is valid for writes of a `rusage`.
        if unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) } != 0 {
            return Err(Error::Clock(io::Error::last_os_error()));
        }
        let wall = Instant::now();
        // SAFETY: `getrusage` succeeded and initialized `usage`.
        let usage = unsafe { usage.assume_init() };
        let user = timeval(usage.ru_utime);
        let system = timeval(usage.ru_stime);
        Ok(Self { wall, user, system })
    }
}

fn timeval(tv: libc::timeval) -> Duration {
    let secs = u64::try_from(tv.tv_sec).unwrap_or(0);
    let micros = u32::try_from(tv.tv_usec).unwrap_or(0);
    Duration::from_secs(secs) + Duration::from_micros(micros.into())
}

/// The wall and CPU time elapsed between two snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timing {
    /// CPU time spent in user space.
    pub user: Duration,
    /// CPU time spent in the kernel.
    pub system: Duration,
    /// Elapsed wall clock time.
    pub wall: Duration,
}

impl Timing {
    /// Returns the time elapsed from `start` to `stop`.
    pub fn between(start: &Snapshot, stop: &Snapshot) -> Self {
        Self {
            user: stop.user.saturating_sub(start.user),
            system: stop.system.saturating_sub(start.system),
            wall: stop.wall.saturating_duration_since(start.wall),
        }
    }

    /// Returns how many cores were busy on average: CPU time over wall time.
    ///
    /// Returns `1.0` if no wall time elapsed.
    pub fn cores(&self) -> f64 {
        if self.wall.is_zero() {
            return 1.0;
        }
        (self.user + self.system).as_secs_f64() / self.wall.as_secs_f64()
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::time::Duration;

    use super::{Snapshot, Timing};

    #[test]
    fn snapshots_are_monotonic() {
        let start = Snapshot::now().unwrap();
        let mut spin = 0_u64;
        for i in 0..100_000 {
            spin = core::hint::black_box(spin.wrapping_add(i));
        }
        let stop = Snapshot::now().unwrap();
        let timing = Timing::between(&start, &stop);
        assert!(timing.wall > Duration::ZERO);
        assert_eq!(Timing::between(&stop, &start).wall, Duration::ZERO);
    }

    #[test]
    fn cores_ratio() {
        let timing = Timing {
            user: Duration::from_millis(1500),
            system: Duration::from_millis(500),
            wall: Duration::from_secs(1),
        };
        assert!((timing.cores() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cores_without_wall_time() {
        let timing = Timing { user: Duration::from_secs(1), ..Timing::default() };
        assert!((timing.cores() - 1.0).abs() < f64::EPSILON);
    }
}
