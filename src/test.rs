// Shared helpers for the unit test suites of this crate. The drivers below
// follow the shape of the Rust's Mutex test suite ("lots and lots" of threads
// hammering a single lock), adapted to raw locks and barriers.
//
// Copyright 2014 The Rust Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

/// Runs `f` on `threads` scoped threads and waits for all of them.
///
/// Panics if any of the threads panicked.
pub fn lots_and_lots<F>(threads: usize, f: F)
where
    F: Fn() + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..threads).map(|_| s.spawn(&f)).collect();
        for handle in handles {
            handle.join().unwrap();
        }
    });
}

/// Counts how many participants made it past some blocking point.
#[derive(Default)]
pub struct Passed(AtomicU32);

impl Passed {
    pub fn mark(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    /// Gives blocked participants a chance to (wrongly) get through, then
    /// returns how many did.
    pub fn settle(&self) -> u32 {
        thread::sleep(Duration::from_millis(50));
        self.count()
    }
}
