//! Transfer pacing under a bandwidth cap.
//!
//! The [`RateLimiter`] enforces an *average-since-start* ceiling: it tracks
//! cumulative bytes and elapsed time for the current file and sleeps exactly
//! long enough for the running average to drop back to the cap. This is not
//! a sliding-window limiter; short bursts above the cap are possible right
//! after a slow start, and that semantic is kept deliberately.
//!
//! Both the limiter and the [`SpeedGauge`] are generic over a [`Clock`] so
//! tests drive them with a manual clock instead of wall time.

use std::time::{Duration, Instant};

/// Time source for pacing decisions.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Instant;
    /// Block for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Clock backed by `std::time::Instant` and `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Average-since-start bandwidth limiter, scoped to one file transfer.
///
/// State must be [`reset`](Self::reset) before each new file so rate history
/// never bleeds across files: a fast first file must not suppress throttling
/// of the next one.
pub struct RateLimiter<C: Clock = SystemClock> {
    clock: C,
    max_bytes_per_sec: u64,
    started_at: Option<Instant>,
    bytes: u64,
}

impl RateLimiter<SystemClock> {
    /// Create a limiter with the given cap in bytes per second.
    ///
    /// A cap of zero disables pacing entirely.
    pub fn new(max_bytes_per_sec: u64) -> Self {
        Self::with_clock(max_bytes_per_sec, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a limiter with an injected clock.
    pub fn with_clock(max_bytes_per_sec: u64, clock: C) -> Self {
        Self {
            clock,
            max_bytes_per_sec,
            started_at: None,
            bytes: 0,
        }
    }

    /// Change the cap. Takes effect from the next recorded chunk.
    pub fn set_rate(&mut self, max_bytes_per_sec: u64) {
        self.max_bytes_per_sec = max_bytes_per_sec;
    }

    /// The configured cap in bytes per second.
    pub fn rate(&self) -> u64 {
        self.max_bytes_per_sec
    }

    /// Discard all rate history, starting a fresh transfer baseline.
    pub fn reset(&mut self) {
        self.started_at = None;
        self.bytes = 0;
    }

    /// Bytes recorded since the last reset.
    pub fn bytes_recorded(&self) -> u64 {
        self.bytes
    }

    /// Record a transferred chunk, sleeping if the running average exceeds
    /// the cap.
    ///
    /// The sleep is sized so that `bytes / elapsed` lands exactly on the cap
    /// when it ends.
    pub fn record(&mut self, chunk_len: usize) {
        if self.max_bytes_per_sec == 0 {
            return;
        }

        let now = self.clock.now();
        let started_at = *self.started_at.get_or_insert(now);
        self.bytes += chunk_len as u64;

        let elapsed = now.duration_since(started_at).as_secs_f64();
        let target = self.bytes as f64 / self.max_bytes_per_sec as f64;

        if elapsed < target {
            self.clock.sleep(Duration::from_secs_f64(target - elapsed));
        }
    }
}

/// Default interval between speed reports (1 second).
const SPEED_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Minimum elapsed transfer time before any speed is reported.
///
/// Below this the divisor is so small that readings are meaningless spikes.
const SPEED_MIN_ELAPSED: Duration = Duration::from_millis(500);

/// Reports average transfer speed, throttled to one reading per interval.
pub struct SpeedGauge<C: Clock = SystemClock> {
    clock: C,
    interval: Duration,
    min_elapsed: Duration,
    started_at: Option<Instant>,
    last_report: Option<Instant>,
}

impl Default for SpeedGauge<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedGauge<SystemClock> {
    /// Create a gauge with the default reporting interval.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> SpeedGauge<C> {
    /// Create a gauge with an injected clock.
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            interval: SPEED_UPDATE_INTERVAL,
            min_elapsed: SPEED_MIN_ELAPSED,
            started_at: None,
            last_report: None,
        }
    }

    /// Discard state for a new file transfer.
    pub fn reset(&mut self) {
        self.started_at = None;
        self.last_report = None;
    }

    /// Sample the average speed in MB/s for `total_bytes` transferred so far.
    ///
    /// Returns `None` while the transfer is younger than the minimum elapsed
    /// threshold or a report was already issued within the interval.
    pub fn sample(&mut self, total_bytes: u64) -> Option<f64> {
        let now = self.clock.now();
        let started_at = *self.started_at.get_or_insert(now);

        let elapsed = now.duration_since(started_at);
        if elapsed < self.min_elapsed {
            return None;
        }

        if let Some(last) = self.last_report {
            if now.duration_since(last) < self.interval {
                return None;
            }
        }

        self.last_report = Some(now);
        Some(total_bytes as f64 / (1024.0 * 1024.0) / elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Deterministic clock; `sleep` advances time and records the total.
    #[derive(Clone)]
    struct ManualClock {
        now: Rc<Cell<Instant>>,
        slept: Rc<Cell<Duration>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Rc::new(Cell::new(Instant::now())),
                slept: Rc::new(Cell::new(Duration::ZERO)),
            }
        }

        fn advance(&self, duration: Duration) {
            self.now.set(self.now.get() + duration);
        }

        fn total_slept(&self) -> Duration {
            self.slept.get()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.slept.set(self.slept.get() + duration);
            self.now.set(self.now.get() + duration);
        }
    }

    #[test]
    fn test_transfer_takes_at_least_bytes_over_cap() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(1000, clock.clone());

        // 2000 bytes at 1000 B/s must occupy at least 2 seconds.
        for _ in 0..4 {
            limiter.record(500);
        }

        assert!(clock.total_slept() >= Duration::from_secs(2));
        assert_eq!(limiter.bytes_recorded(), 2000);
    }

    #[test]
    fn test_no_sleep_when_under_cap() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(1_000_000, clock.clone());

        limiter.record(100);
        clock.advance(Duration::from_secs(1));
        limiter.record(100);

        // 200 bytes over a second is far below the cap.
        assert_eq!(clock.total_slept(), Duration::ZERO);
    }

    #[test]
    fn test_burst_allowed_after_slow_start() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(1000, clock.clone());

        // Start the transfer, then idle long enough to accumulate credit.
        limiter.record(100);
        clock.advance(Duration::from_secs(10));

        // The running average is far below the cap now, so a burst of
        // several chunks goes through without sleeping. This is the
        // documented average-since-start semantic.
        let slept_before = clock.total_slept();
        limiter.record(2000);
        limiter.record(2000);
        assert_eq!(clock.total_slept(), slept_before);
    }

    #[test]
    fn test_reset_starts_fresh_baseline() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(1000, clock.clone());

        // Build up idle credit on the first file.
        limiter.record(100);
        clock.advance(Duration::from_secs(60));

        // A new file must not inherit that credit: its first oversized chunk
        // throttles immediately.
        limiter.reset();
        assert_eq!(limiter.bytes_recorded(), 0);

        let slept_before = clock.total_slept();
        limiter.record(3000);
        assert!(clock.total_slept() > slept_before);
    }

    #[test]
    fn test_zero_cap_disables_pacing() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(0, clock.clone());

        limiter.record(10_000_000);
        assert_eq!(clock.total_slept(), Duration::ZERO);
    }

    #[test]
    fn test_set_rate_applies_to_next_chunk() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(0, clock.clone());

        limiter.record(5000);
        assert_eq!(clock.total_slept(), Duration::ZERO);

        limiter.set_rate(1000);
        assert_eq!(limiter.rate(), 1000);
        limiter.record(5000);
        assert!(clock.total_slept() > Duration::ZERO);
    }

    #[test]
    fn test_gauge_suppresses_early_readings() {
        let clock = ManualClock::new();
        let mut gauge = SpeedGauge::with_clock(clock.clone());

        // Too early: below the minimum elapsed threshold.
        assert_eq!(gauge.sample(1024), None);
        clock.advance(Duration::from_millis(100));
        assert_eq!(gauge.sample(2048), None);
    }

    #[test]
    fn test_gauge_reports_once_per_interval() {
        let clock = ManualClock::new();
        let mut gauge = SpeedGauge::with_clock(clock.clone());

        gauge.sample(0);
        clock.advance(Duration::from_secs(1));

        let first = gauge.sample(2 * 1024 * 1024);
        assert!(first.is_some());
        // 2 MiB over one second.
        assert!((first.unwrap() - 2.0).abs() < 0.01);

        // Within the interval: suppressed.
        clock.advance(Duration::from_millis(200));
        assert_eq!(gauge.sample(3 * 1024 * 1024), None);

        // After the interval: reported again.
        clock.advance(Duration::from_secs(1));
        assert!(gauge.sample(4 * 1024 * 1024).is_some());
    }

    #[test]
    fn test_gauge_reset_restarts_thresholds() {
        let clock = ManualClock::new();
        let mut gauge = SpeedGauge::with_clock(clock.clone());

        gauge.sample(0);
        clock.advance(Duration::from_secs(2));
        assert!(gauge.sample(1024).is_some());

        gauge.reset();
        // Fresh transfer: the minimum-elapsed gate applies again.
        assert_eq!(gauge.sample(1024), None);
    }
}
