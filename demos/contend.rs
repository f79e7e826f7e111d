use futex_wait::bench::{self, Backend, Config};
use futex_wait::report::Format;

fn main() {
    // Sweep the number of futexes shared by a fixed set of threads, from every
    // thread fighting over a single lock to every thread owning its own.
    const THREADS: u32 = 16;
    const ITERATIONS: u64 = 1_600_000;

    for backend in [Backend::Handshake, Backend::Futex] {
        println!("## {backend:?} synchronization");
        let mut futexes = 1;
        while futexes <= THREADS {
            let config = Config { iterations: ITERATIONS, threads: THREADS, futexes, backend, ..Config::default() };
            // Every configuration in the sweep divides evenly, so the only
            // failures left are resource exhaustion and a too short window.
            match bench::run(&config).and_then(|outcome| outcome.report(&config)) {
                Ok(report) => print!("{}", report.display(Format::Default)),
                Err(err) => eprintln!("{THREADS} threads on {futexes} futexes: {err}"),
            }
            futexes *= 2;
        }
    }
}
