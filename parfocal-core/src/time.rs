//! Millisecond timestamps
//!
//! The loop is handed a free-running `u32` millisecond counter. It wraps after
//! ~49 days, so elapsed time is always computed with wrapping subtraction.

/// Milliseconds elapsed from `since` to `now`, tolerant of counter wrap
pub fn elapsed_ms(now_ms: u32, since_ms: u32) -> u32 {
    now_ms.wrapping_sub(since_ms)
}

/// Whether at least `interval_ms` has passed since `since_ms`
pub fn has_elapsed(now_ms: u32, since_ms: u32, interval_ms: u32) -> bool {
    elapsed_ms(now_ms, since_ms) >= interval_ms
}
