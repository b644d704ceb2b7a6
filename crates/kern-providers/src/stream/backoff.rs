//! Bounded-backoff spin loop.
//!
//! The wait side of a notification cannot enqueue its device-side wait until
//! the paired `notify()` has recorded the marker. That window is normally
//! tiny, so the waiter spins; but an unbounded hard spin would starve other
//! host threads if the producer is delayed. This backoff spins with
//! `spin_loop` hints for a bounded number of rounds and then starts yielding
//! the thread. The trade-off between spin latency and host CPU burn is
//! deliberate and tunable here, not hidden behind an async abstraction.

use std::sync::atomic::{AtomicBool, Ordering};

/// Spin rounds (doubling `spin_loop` hints per round) before yielding.
const SPIN_LIMIT: u32 = 6;

/// Incremental backoff state for one spin loop.
#[derive(Debug, Default)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    /// Start a fresh backoff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spin briefly, escalating to `yield_now` once the spin budget is spent.
    pub fn snooze(&mut self) {
        if self.step <= SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                std::hint::spin_loop();
            }
            self.step += 1;
        } else {
            std::thread::yield_now();
        }
    }
}

/// Spin with backoff until `flag` is observed `true` with acquire ordering.
pub fn spin_until(flag: &AtomicBool) {
    let mut backoff = Backoff::new();
    while !flag.load(Ordering::Acquire) {
        backoff.snooze();
    }
}
