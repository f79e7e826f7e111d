//! Benchmark report rendering.

use core::fmt::{self, Display, Formatter};

use crate::error::{Error, Result};
use crate::time::Timing;

/// The output format of a report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Configuration, timing breakdown and throughput.
    #[default]
    Default,
    /// Throughput only.
    Simple,
}

/// The result of a benchmark run, ready to be printed.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use futex_wait::report::{Format, Report};
/// use futex_wait::time::Timing;
///
/// let timing = Timing { wall: Duration::from_secs(2), ..Timing::default() };
/// let report = Report::new(4, 2, 1_000_000, timing).unwrap();
/// assert_eq!(report.kiter_per_sec(), 500.0);
/// assert_eq!(report.display(Format::Simple).to_string(), "500 Kiter/s\n");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Report {
    threads: u32,
    futexes: u32,
    timing: Timing,
    kiter_per_sec: f64,
}

impl Report {
    /// Derives the throughput of `iterations` lock and unlock pairs over the
    /// measured `timing`.
    ///
    /// Returns [`Error::ZeroFutexes`] if `futexes` is zero and
    /// [`Error::ZeroElapsed`] if no wall time elapsed.
    pub fn new(threads: u32, futexes: u32, iterations: u64, timing: Timing) -> Result<Self> {
        if futexes == 0 {
            return Err(Error::ZeroFutexes);
        }
        if timing.wall.is_zero() {
            return Err(Error::ZeroElapsed);
        }
        let kiter_per_sec = iterations as f64 / (timing.wall.as_secs_f64() * 1000.0);
        Ok(Self { threads, futexes, timing, kiter_per_sec })
    }

    /// Returns the throughput in thousands of iterations per second.
    pub fn kiter_per_sec(&self) -> f64 {
        self.kiter_per_sec
    }

    /// Returns the measured timing.
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Returns a [`Display`] adapter that renders this report in `format`.
    pub fn display(&self, format: Format) -> Formatted<'_> {
        Formatted { report: self, format }
    }
}

/// A [`Report`] rendered in some [`Format`].
pub struct Formatted<'a> {
    report: &'a Report,
    format: Format,
}

impl Display for Formatted<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Report { threads, futexes, timing, kiter_per_sec } = self.report;
        match self.format {
            Format::Default => {
                let per_futex = threads / futexes;
                writeln!(f, "# {threads} threads and {futexes} futexes ({per_futex} threads for 1 futex)")?;
                writeln!(
                    f,
                    "{:.2}s user, {:.2}s system, {:.2}s wall, {:.2} cores",
                    timing.user.as_secs_f64(),
                    timing.system.as_secs_f64(),
                    timing.wall.as_secs_f64(),
                    timing.cores(),
                )?;
                writeln!(f, "Result: {kiter_per_sec:.0} Kiter/s")
            }
            Format::Simple => writeln!(f, "{kiter_per_sec:.0} Kiter/s"),
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{Format, Report};
    use crate::error::Error;
    use crate::time::Timing;

    fn timing() -> Timing {
        Timing {
            user: Duration::from_millis(1250),
            system: Duration::from_millis(2750),
            wall: Duration::from_secs(2),
        }
    }

    #[test]
    fn default_format() {
        let report = Report::new(256, 4, 100_000_000, timing()).unwrap();
        let expected = "\
# 256 threads and 4 futexes (64 threads for 1 futex)
1.25s user, 2.75s system, 2.00s wall, 2.00 cores
Result: 50000 Kiter/s
";
        assert_eq!(report.display(Format::Default).to_string(), expected);
    }

    #[test]
    fn simple_format() {
        let report = Report::new(256, 4, 100_000_000, timing()).unwrap();
        assert_eq!(report.display(Format::Simple).to_string(), "50000 Kiter/s\n");
    }

    #[test]
    fn zero_futexes_is_an_error() {
        let err = Report::new(4, 0, 1000, timing()).unwrap_err();
        assert!(matches!(err, Error::ZeroFutexes));
    }

    #[test]
    fn zero_wall_time_is_an_error() {
        let timing = Timing { wall: Duration::ZERO, ..timing() };
        let err = Report::new(1, 1, 1000, timing).unwrap_err();
        assert!(matches!(err, Error::ZeroElapsed));
    }
}
