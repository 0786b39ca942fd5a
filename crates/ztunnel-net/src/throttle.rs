// ============================================
// File: crates/ztunnel-net/src/throttle.rs
// ============================================
//! # Token-Bucket Bandwidth Throttler
//!
//! ## Creation Reason
//! Relay operators cap per-tunnel bandwidth; this throttler enforces
//! the cap with nanosecond-precision accounting and a deliberately
//! split consume/wait API.
//!
//! ## Main Functionality
//! - [`Throttle`]: token bucket with `consume` / `wait` / `set_rate`
//! - [`parse_bandwidth`]: human-readable rate strings to bytes/sec
//!
//! ## Main Logical Flow
//! 1. `consume(bytes)` refills from elapsed time, then either debits
//!    and returns `false`, or records the required wait and returns
//!    `true` WITHOUT debiting
//! 2. The caller may interleave other work, then calls `wait()`
//! 3. The next `consume` after the wait finds tokens and debits
//!
//! ## Design Choices
//! - Tokens are only debited on a successful consume; a caller that
//!   abandons the operation between `consume` and `wait` is not
//!   charged
//! - Refill math runs as `(elapsed_ns / 1000) * rate / 10^6`, keeping
//!   intermediates inside 64 bits for multi-GiB/s rates at the cost
//!   of microsecond quantization
//! - Burst capacity is one second of rate; a fresh throttle starts
//!   with a full bucket
//!
//! ## ⚠️ Important Note for Next Developer
//! - A rate of 0 disables throttling entirely; `consume` never asks
//!   for a wait
//! - Waits under 1 microsecond busy-spin on the cycle counter where
//!   available; the scheduler cannot sleep that precisely
//!
//! ## Last Modified
//! v0.1.0 - Initial token-bucket throttler

use tracing::debug;

use crate::time;

// ============================================
// Throttle
// ============================================

/// A token-bucket bandwidth throttler.
///
/// Single-threaded by contract: wrap it in a mutex if it must be
/// shared.
///
/// # Example
/// ```
/// use ztunnel_net::throttle::Throttle;
///
/// let mut throttle = Throttle::new(1_000_000); // 1 MB/s
/// if throttle.consume(1500) {
///     throttle.wait();
/// }
/// ```
#[derive(Debug)]
pub struct Throttle {
    /// Rate limit in bytes per second (0 = unlimited)
    rate_bps: u64,
    /// Available tokens, in bytes
    tokens: u64,
    /// Burst cap: one second of rate
    max_tokens: u64,
    /// Monotonic timestamp of the last refill
    last_refill: u64,
    /// Wait recorded by the most recent failed consume
    wait_ns: u64,
}

impl Throttle {
    /// Creates a throttler limited to `rate_bps` bytes per second.
    ///
    /// A rate of 0 creates a no-op throttler that never waits.
    #[must_use]
    pub fn new(rate_bps: u64) -> Self {
        debug!(rate_bps, "throttle created");
        Self {
            rate_bps,
            tokens: if rate_bps > 0 { rate_bps } else { u64::MAX },
            max_tokens: if rate_bps > 0 { rate_bps } else { u64::MAX },
            last_refill: time::now_ns(),
            wait_ns: 0,
        }
    }

    /// Adds tokens for the time elapsed since the last refill.
    fn refill(&mut self) {
        let now = time::now_ns();
        let elapsed_ns = now.saturating_sub(self.last_refill);
        if elapsed_ns == 0 || self.rate_bps == 0 {
            return;
        }

        let tokens_to_add = (elapsed_ns / 1000) * self.rate_bps / 1_000_000;
        if tokens_to_add > 0 {
            self.tokens = self.tokens.saturating_add(tokens_to_add).min(self.max_tokens);
            self.last_refill = now;
        }
    }

    /// Requests `bytes` tokens.
    ///
    /// Returns `false` if the tokens were available and debited.
    /// Returns `true` if the caller must [`wait`](Self::wait) first;
    /// in that case nothing is debited and the wait duration is
    /// recorded internally.
    pub fn consume(&mut self, bytes: u64) -> bool {
        if self.rate_bps == 0 {
            return false;
        }

        self.refill();

        if self.tokens >= bytes {
            self.tokens -= bytes;
            self.wait_ns = 0;
            return false;
        }

        let deficit = bytes - self.tokens;
        self.wait_ns = (u128::from(deficit) * 1_000_000_000 / u128::from(self.rate_bps)) as u64;
        true
    }

    /// Blocks until the wait recorded by the last `consume` elapses.
    ///
    /// Sub-microsecond waits busy-spin on the cycle counter (about 3
    /// cycles per nanosecond at 3 GHz); anything longer sleeps on the
    /// monotonic clock. Clears the recorded wait afterwards.
    pub fn wait(&mut self) {
        if self.wait_ns == 0 {
            return;
        }

        if self.wait_ns < 1000 {
            Self::spin_wait(self.wait_ns);
        } else {
            time::sleep_ns(self.wait_ns);
        }

        self.refill();
        self.wait_ns = 0;
    }

    #[cfg(target_arch = "x86_64")]
    fn spin_wait(ns: u64) {
        let target = time::rdtsc() + ns * 3;
        while time::rdtsc() < target {
            time::cpu_pause();
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn spin_wait(_ns: u64) {
        // No cycle counter: a 1 microsecond sleep is the floor
        time::sleep_ns(1000);
    }

    /// Consumes `bytes`, waiting first if the bucket is empty.
    ///
    /// Equivalent to `if consume(bytes) { wait(); consume(bytes); }`
    /// collapsed into the common call every data path makes.
    pub fn throttle(&mut self, bytes: u64) {
        if self.consume(bytes) {
            self.wait();
            // Post-wait consume debits the now-available tokens
            self.consume(bytes);
        }
    }

    /// The configured rate in bytes per second.
    #[must_use]
    pub const fn rate(&self) -> u64 {
        self.rate_bps
    }

    /// The wait recorded by the most recent `consume`, in nanoseconds.
    #[must_use]
    pub const fn pending_wait_ns(&self) -> u64 {
        self.wait_ns
    }

    /// Updates the rate limit and burst cap.
    ///
    /// Tokens above the new cap are discarded immediately.
    pub fn set_rate(&mut self, rate_bps: u64) {
        debug!(old = self.rate_bps, new = rate_bps, "throttle rate updated");
        self.rate_bps = rate_bps;
        self.max_tokens = if rate_bps > 0 { rate_bps } else { u64::MAX };
        if self.tokens > self.max_tokens {
            self.tokens = self.max_tokens;
        }
    }
}

// ============================================
// Bandwidth Parsing
// ============================================

/// Parses a human-readable bandwidth string into bytes per second.
///
/// Accepts bit rates (`"3kbps"`, `"1mbit/s"`), byte rates
/// (`"500kb/s"`, `"10m"`), IEC units (`"4mib/s"`) and plain numbers
/// (bytes per second). Returns `None` for anything unrecognized.
///
/// # Example
/// ```
/// use ztunnel_net::throttle::parse_bandwidth;
///
/// assert_eq!(parse_bandwidth("3kbps"), Some(375));
/// assert_eq!(parse_bandwidth("10m"), Some(10_000_000));
/// ```
#[must_use]
pub fn parse_bandwidth(s: &str) -> Option<u64> {
    let s = s.trim().to_lowercase();

    let Some(pos) = s.find(|c: char| !c.is_numeric() && c != '.') else {
        return s.parse::<u64>().ok(); // Plain number = bytes/sec
    };
    let (num_str, unit) = (&s[..pos], &s[pos..]);

    let num: f64 = num_str.parse().ok()?;

    let multiplier = match unit {
        // Bits per second
        "bps" | "bit/s" => 1.0 / 8.0,
        "kbps" | "kbit/s" => 1_000.0 / 8.0,
        "mbps" | "mbit/s" => 1_000_000.0 / 8.0,
        "gbps" | "gbit/s" => 1_000_000_000.0 / 8.0,

        // Bytes per second
        "b/s" => 1.0,
        "kb/s" | "k" => 1_000.0,
        "mb/s" | "m" => 1_000_000.0,
        "gb/s" | "g" => 1_000_000_000.0,

        // IEC units
        "kib/s" | "ki" => 1_024.0,
        "mib/s" | "mi" => 1_048_576.0,
        "gib/s" | "gi" => 1_073_741_824.0,

        _ => return None,
    };

    Some((num * multiplier) as u64)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create() {
        let t = Throttle::new(1024 * 1024);
        assert_eq!(t.rate(), 1024 * 1024);
        assert_eq!(t.tokens, 1024 * 1024);
    }

    #[test]
    fn test_unlimited_never_waits() {
        let mut t = Throttle::new(0);
        assert!(!t.consume(999_999));
        assert!(!t.consume(u64::MAX / 2));
        assert_eq!(t.pending_wait_ns(), 0);
    }

    #[test]
    fn test_burst_then_wait() {
        let mut t = Throttle::new(100);
        // One second of burst is available immediately
        assert!(!t.consume(50));
        assert!(!t.consume(50));
        // Bucket is empty; a further 50 bytes needs ~0.5s
        assert!(t.consume(50));
        let wait = t.pending_wait_ns();
        assert!(
            (450_000_000..=550_000_000).contains(&wait),
            "wait_ns = {wait}"
        );
        // The failed consume did not debit
        assert!(t.tokens <= 1);
    }

    #[test]
    fn test_consume_does_not_debit_on_wait() {
        let mut t = Throttle::new(1000);
        assert!(!t.consume(1000));
        let tokens_before = t.tokens;
        assert!(t.consume(500));
        assert_eq!(t.tokens, tokens_before);
    }

    #[test]
    fn test_refill_caps_at_max() {
        // Start full, let time pass, and verify the refill cannot
        // push the bucket beyond its burst cap
        let mut t = Throttle::new(1_000_000_000);
        std::thread::sleep(std::time::Duration::from_millis(2));
        t.refill();
        assert_eq!(t.tokens, t.max_tokens);
    }

    #[test]
    fn test_wait_then_consume_succeeds() {
        let mut t = Throttle::new(100_000); // 100 KB/s
        assert!(!t.consume(100_000));
        // 1 KB deficit -> ~10 ms wait
        assert!(t.consume(1_000));
        t.wait();
        assert_eq!(t.pending_wait_ns(), 0);
        assert!(!t.consume(1_000));
    }

    #[test]
    fn test_throttle_convenience() {
        let mut t = Throttle::new(1_000_000);
        let start = time::now_ns();
        t.throttle(100);
        // Within the burst, no measurable wait
        assert!(time::now_ns() - start < 100_000_000);
    }

    #[test]
    fn test_set_rate_truncates_tokens() {
        let mut t = Throttle::new(1000);
        t.set_rate(100);
        assert_eq!(t.rate(), 100);
        assert_eq!(t.max_tokens, 100);
        assert!(t.tokens <= 100);
    }

    #[test]
    fn test_set_rate_to_unlimited() {
        let mut t = Throttle::new(10);
        t.set_rate(0);
        assert!(!t.consume(123_456_789));
    }

    #[test]
    fn test_sustained_rate_bound() {
        // Over a short window the bucket must never hand out more
        // than burst + rate * elapsed
        let mut t = Throttle::new(1_000_000);
        let start = time::now_ns();
        let mut granted = 0u64;
        while time::now_ns() - start < 50_000_000 {
            if !t.consume(10_000) {
                granted += 10_000;
            }
        }
        let elapsed_s = (time::now_ns() - start) as f64 / 1e9;
        let bound = 1_000_000.0 * elapsed_s + 1_000_000.0 + 10_000.0;
        assert!(
            (granted as f64) <= bound,
            "granted {granted} bytes exceeds bound {bound}"
        );
    }

    #[test]
    fn test_parse_bandwidth() {
        assert_eq!(parse_bandwidth("3kbps"), Some(375));
        assert_eq!(parse_bandwidth("1mbps"), Some(125_000));
        assert_eq!(parse_bandwidth("500kb/s"), Some(500_000));
        assert_eq!(parse_bandwidth("10m"), Some(10_000_000));
        assert_eq!(parse_bandwidth("1024"), Some(1024));
        assert_eq!(parse_bandwidth("4mib/s"), Some(4 * 1_048_576));
        assert_eq!(parse_bandwidth("  2k  "), Some(2_000));
        assert_eq!(parse_bandwidth("fast"), None);
        assert_eq!(parse_bandwidth("10parsecs"), None);
    }
}
