pub mod atomic {
    #[cfg(not(all(loom, test)))]
    pub use core::sync::atomic::AtomicU32;

    #[cfg(all(loom, test))]
    pub use loom::sync::atomic::AtomicU32;
}

#[cfg(all(loom, test))]
pub mod thread {
    pub use loom::thread::yield_now;
}
