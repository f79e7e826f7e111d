use std::sync::atomic::{AtomicU64, Ordering};

use futex_wait::bench::{self, Backend, Config};
use futex_wait::pool::{CriticalSection, Occupancy};
use futex_wait::report::Format;
use futex_wait::Error;

fn config(iterations: u64, threads: u32, futexes: u32, backend: Backend) -> Config {
    Config { iterations, threads, futexes, backend, format: Format::Simple }
}

/// Counts the critical sections entered, per pool slot.
struct Tally(Vec<AtomicU64>);

impl Tally {
    fn new(slots: usize) -> Self {
        Self((0..slots).map(|_| AtomicU64::new(0)).collect())
    }

    fn counts(&self) -> Vec<u64> {
        self.0.iter().map(|count| count.load(Ordering::Relaxed)).collect()
    }
}

impl CriticalSection for Tally {
    fn enter(&self, slot: usize) {
        self.0[slot].fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn uneven_split_is_rejected() {
    for backend in [Backend::Futex, Backend::Handshake] {
        let probe = Occupancy::new(3);
        let err = bench::run_with(&config(1000, 10, 3, backend), &probe).unwrap_err();
        assert!(matches!(err, Error::UnevenFutexes { threads: 10, futexes: 3 }));
        assert_eq!(err.to_string(), "threads % futexes must be 0 (got 10 threads and 3 futexes)");
        assert_eq!(probe.total(), 0);
    }
}

#[test]
fn even_split_is_accepted() {
    let config = config(1000, 10, 2, Backend::Handshake);
    assert!(config.validate().is_ok());
    let outcome = bench::run(&config).unwrap();
    assert_eq!(outcome.executed, 1000);
}

#[test]
fn single_thread_runs_exact_iterations() {
    for backend in [Backend::Futex, Backend::Handshake] {
        let probe = Occupancy::new(1);
        let outcome = bench::run_with(&config(1000, 1, 1, backend), &probe).unwrap();
        assert_eq!(probe.total(), 1000);
        assert_eq!(outcome.executed, 1000);
    }
}

#[test]
fn backends_execute_the_same_work() {
    let futex = Tally::new(4);
    let handshake = Tally::new(4);
    let by_futex = bench::run_with(&config(48_000, 24, 4, Backend::Futex), &futex).unwrap();
    let by_handshake =
        bench::run_with(&config(48_000, 24, 4, Backend::Handshake), &handshake).unwrap();
    assert_eq!(by_futex.executed, by_handshake.executed);
    assert_eq!(futex.counts(), handshake.counts());
    assert_eq!(futex.counts(), vec![12_000; 4]);
}

#[test]
fn mutual_exclusion_under_contention() {
    for backend in [Backend::Futex, Backend::Handshake] {
        let probe = Occupancy::new(2);
        bench::run_with(&config(64_000, 32, 2, backend), &probe).unwrap();
        assert_eq!(probe.max(), 1);
        assert_eq!(probe.total(), 64_000);
    }
}

#[test]
fn report_uses_configured_iterations() {
    let config = Config { iterations: 20_000, threads: 4, futexes: 4, ..Config::default() };
    let outcome = bench::run(&config).unwrap();
    let report = outcome.report(&config).unwrap();
    let expected = 20_000.0 / outcome.timing.wall.as_secs_f64() / 1000.0;
    assert!((report.kiter_per_sec() - expected).abs() <= expected * 1e-9);

    let detailed = report.display(Format::Default).to_string();
    let mut lines = detailed.lines();
    assert_eq!(lines.next(), Some("# 4 threads and 4 futexes (1 threads for 1 futex)"));
    assert!(lines.next().is_some_and(|line| line.ends_with(" cores")));
    assert!(lines.next().is_some_and(|line| line.starts_with("Result: ")));
    assert_eq!(lines.next(), None);
}
