use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Bencher, Criterion};
use futex_wait::bench::{self, Backend, Config};
use futex_wait::Mutex;

fn gen_create(bencher: &mut Bencher) {
    bencher.iter(|| black_box(Mutex::new()));
}

fn gen_lock_unlock(bencher: &mut Bencher) {
    let mutex = Mutex::new();
    bencher.iter(|| {
        mutex.lock();
        mutex.unlock();
    });
}

fn gen_lock_unlock_contention(bencher: &mut Bencher) {
    let mutex = Mutex::new();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Relaxed) {
                for _ in 0..1000 {
                    mutex.lock();
                    mutex.unlock();
                }
            }
        });

        bencher.iter(|| {
            mutex.lock();
            mutex.unlock();
        });
        done.store(true, Ordering::Relaxed);
    });
}

fn create(criterion: &mut Criterion) {
    criterion.bench_function("create", gen_create);
}

fn lock_unlock(criterion: &mut Criterion) {
    criterion.bench_function("lock_unlock", gen_lock_unlock);
}

fn lock_unlock_contention(criterion: &mut Criterion) {
    criterion.bench_function("lock_unlock_contention", gen_lock_unlock_contention);
}

fn harness(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("harness");
    group.sample_size(10);
    for backend in [Backend::Futex, Backend::Handshake] {
        let config = Config { iterations: 100_000, threads: 8, futexes: 1, backend, ..Config::default() };
        group.bench_with_input(BenchmarkId::from_parameter(format!("{backend:?}")), &config, |b, config| {
            b.iter(|| bench::run(config).map(|outcome| outcome.executed))
        });
    }
    group.finish();
}

criterion_group!(mutex, create, lock_unlock, lock_unlock_contention, harness);

criterion_main!(mutex);
