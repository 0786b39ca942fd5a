// ============================================
// File: crates/ztunnel-net/src/time.rs
// ============================================
//! # Timing Utilities
//!
//! ## Creation Reason
//! The throttler and the connection pool both need a cheap monotonic
//! clock; the sub-microsecond wait path additionally needs the CPU
//! cycle counter. This module is the single home for both.
//!
//! ## Main Functionality
//! - [`now_ns`] / [`now_ms`]: Monotonic timestamps from a process-wide
//!   epoch
//! - [`sleep_ns`]: Blocking sleep with nanosecond granularity
//! - [`rdtsc`] / [`cpu_pause`]: x86-64 cycle counter and spin hint
//!
//! ## Design Choices
//! - The epoch is a lazily initialized `Instant` (initialized once,
//!   never freed), so timestamps are small offsets rather than raw
//!   clock values
//! - `rdtsc`/`cpu_pause` are advisory accelerants for busy-waiting;
//!   nothing may depend on their availability
//!
//! ## ⚠️ Important Note for Next Developer
//! - `now_ns` is monotonic and non-decreasing; wall-clock time is
//!   deliberately not exposed here
//! - The first caller pins the epoch, so the very first timestamp in
//!   a process is 0
//!
//! ## Last Modified
//! v0.1.0 - Initial timing utilities

use std::sync::OnceLock;
use std::time::{Duration, Instant};

// ============================================
// Monotonic Clock
// ============================================

/// Process-wide reference instant (initialized on first use).
fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Returns a monotonic timestamp in nanoseconds since the process
/// epoch.
#[must_use]
pub fn now_ns() -> u64 {
    epoch().elapsed().as_nanos() as u64
}

/// Returns a monotonic timestamp in milliseconds since the process
/// epoch.
#[must_use]
pub fn now_ms() -> u64 {
    epoch().elapsed().as_millis() as u64
}

/// Sleeps for at least `ns` nanoseconds.
///
/// Actual resolution is whatever the OS scheduler grants; for waits
/// under a microsecond prefer the cycle-counter spin in the caller.
pub fn sleep_ns(ns: u64) {
    std::thread::sleep(Duration::from_nanos(ns));
}

// ============================================
// Cycle Counter (x86-64)
// ============================================

/// Reads the CPU timestamp counter.
#[cfg(target_arch = "x86_64")]
#[must_use]
pub fn rdtsc() -> u64 {
    // Safe on every x86-64 CPU this crate targets
    unsafe { core::arch::x86_64::_rdtsc() }
}

/// Emits a pause hint for busy-wait loops.
#[cfg(target_arch = "x86_64")]
pub fn cpu_pause() {
    std::hint::spin_loop();
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ns_monotonic() {
        let a = now_ns();
        let b = now_ns();
        assert!(b >= a);
    }

    #[test]
    fn test_sleep_ns_blocks() {
        let start = now_ns();
        sleep_ns(2_000_000); // 2 ms
        assert!(now_ns() - start >= 2_000_000);
    }

    #[test]
    fn test_now_ms_tracks_now_ns() {
        let ms = now_ms();
        let ns = now_ns();
        assert!(ns / 1_000_000 >= ms);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_rdtsc_advances() {
        let a = rdtsc();
        for _ in 0..1000 {
            cpu_pause();
        }
        let b = rdtsc();
        assert!(b > a);
    }
}
