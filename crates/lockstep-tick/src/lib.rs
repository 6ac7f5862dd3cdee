//! Fixed-timestep tick scheduler.
//!
//! Drives a room loop at a fixed rate. Overruns are handled by skipping
//! ahead: the next tick is always scheduled relative to now, so a slow tick
//! cannot snowball into a catch-up burst.
//!
//! Designed to sit inside a room's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(msg) = inbound.recv() => { /* handle */ }
//!         info = scheduler.wait_for_tick() => { game.tick(now); }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::warn;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz. Must be non-zero.
    pub tick_rate_hz: u32,
    /// Random jitter (0–max µs) added to the first tick so rooms created in
    /// the same instant don't all fire together.
    pub initial_jitter_us: u64,
}

impl TickConfig {
    /// Config for a specific rate with default jitter.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            initial_jitter_us: 2_000,
        }
    }

    /// Duration of a single tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }
}

/// Information about a fired tick.
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// Fixed delta time, always `1 / tick_rate`.
    pub dt: Duration,
    /// `true` if this tick fired noticeably late.
    pub overrun: bool,
    /// Ticks skipped while catching up to now (0 in normal operation).
    pub ticks_skipped: u64,
}

/// Fixed-timestep scheduler. One per room loop.
pub struct TickScheduler {
    tick_duration: Duration,
    tick_count: u64,
    skipped_total: u64,
    next_tick: Instant,
}

impl TickScheduler {
    /// Creates a scheduler; the first tick is due one period (plus jitter)
    /// from now.
    pub fn new(config: TickConfig) -> Self {
        let tick_duration = config.tick_duration();
        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(
                rand::rng().random_range(0..config.initial_jitter_us),
            )
        } else {
            Duration::ZERO
        };
        Self {
            tick_duration,
            tick_count: 0,
            skipped_total: 0,
            next_tick: Instant::now() + tick_duration + jitter,
        }
    }

    /// Scheduler for a specific rate with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        time::sleep_until(self.next_tick).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(self.next_tick);
        let overrun = late_by > self.tick_duration / 10;
        let mut ticks_skipped = 0u64;
        if overrun {
            ticks_skipped =
                late_by.as_nanos() as u64 / self.tick_duration.as_nanos() as u64;
            if ticks_skipped > 0 {
                self.skipped_total += ticks_skipped;
                warn!(
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "tick overrun, skipping ahead"
                );
            }
        }
        // Reschedule from now, not from the missed deadline.
        self.next_tick = now + self.tick_duration;

        TickInfo {
            tick: self.tick_count,
            dt: self.tick_duration,
            overrun,
            ticks_skipped,
        }
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Total ticks lost to overruns.
    pub fn skipped_total(&self) -> u64 {
        self.skipped_total
    }

    /// The fixed tick period.
    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler_30hz() -> TickScheduler {
        TickScheduler::new(TickConfig {
            tick_rate_hz: 30,
            initial_jitter_us: 0,
        })
    }

    #[test]
    fn test_tick_duration_30hz() {
        let cfg = TickConfig::with_rate(30);
        assert_eq!(cfg.tick_duration(), Duration::from_secs_f64(1.0 / 30.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_increment_monotonically() {
        let mut s = scheduler_30hz();
        for expected in 1..=5 {
            let info = s.wait_for_tick().await;
            assert_eq!(info.tick, expected);
        }
        assert_eq!(s.tick_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dt_is_fixed() {
        let mut s = scheduler_30hz();
        let expected = Duration::from_secs_f64(1.0 / 30.0);
        for _ in 0..3 {
            assert_eq!(s.wait_for_tick().await.dt, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_normal_tick_has_no_overrun() {
        let mut s = scheduler_30hz();
        let info = s.wait_for_tick().await;
        assert!(!info.overrun);
        assert_eq!(info.ticks_skipped, 0);
        assert_eq!(s.skipped_total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_skips_ahead() {
        let mut s = scheduler_30hz();
        s.wait_for_tick().await;

        // Miss three whole periods before waiting again.
        tokio::time::advance(s.tick_duration() * 4).await;
        let info = s.wait_for_tick().await;
        assert!(info.overrun);
        assert!(info.ticks_skipped >= 3);

        // The schedule recovered: the following tick is on time.
        let info = s.wait_for_tick().await;
        assert!(!info.overrun);
    }
}
