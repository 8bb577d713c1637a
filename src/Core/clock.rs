// Monotonic time helpers for gate deadlines and cell timestamps.
// Nothing here reads the wall clock, so timed waits are immune to system time changes.

use std::time::{Duration, Instant};

#[cfg(not(unix))]
lazy_static::lazy_static! {
    static ref PROCESS_EPOCH: Instant = Instant::now();
}

/// Current monotonic time in nanoseconds.
///
/// On unix this is `CLOCK_MONOTONIC`, so values are comparable across threads
/// of the same boot. Elsewhere it counts from the first call in the process.
#[cfg(unix)]
pub fn monotonic_now_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // CLOCK_MONOTONIC cannot fail with a valid timespec pointer
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as u64)
        .saturating_mul(1_000_000_000)
        .saturating_add(ts.tv_nsec as u64)
}

#[cfg(not(unix))]
pub fn monotonic_now_ns() -> u64 {
    PROCESS_EPOCH.elapsed().as_nanos() as u64
}

/// Deadline `timeout` from now on the monotonic clock.
///
/// Returns `None` when the deadline is not representable, which callers
/// treat as "wait until signalled".
#[inline]
pub fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Convert a signed microsecond timeout into a `Duration`.
/// Zero and negative values mean "do not block".
#[inline]
pub fn timeout_from_micros(micros: i64) -> Duration {
    if micros <= 0 {
        Duration::ZERO
    } else {
        Duration::from_micros(micros as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let a = monotonic_now_ns();
        std::thread::sleep(Duration::from_millis(2));
        let b = monotonic_now_ns();
        assert!(b > a);
        assert!(b - a >= 2_000_000);
    }

    #[test]
    fn non_positive_timeouts_are_non_blocking() {
        assert_eq!(timeout_from_micros(0), Duration::ZERO);
        assert_eq!(timeout_from_micros(-50), Duration::ZERO);
        assert_eq!(timeout_from_micros(i64::MIN), Duration::ZERO);
        assert_eq!(timeout_from_micros(1_500), Duration::from_micros(1_500));
    }

    #[test]
    fn huge_timeout_has_no_deadline() {
        assert!(deadline_after(Duration::MAX).is_none());
        let d = deadline_after(Duration::from_millis(5)).unwrap();
        assert!(d > Instant::now());
    }
}
