//! Frame scheduler
//!
//! Cooperative ~30 Hz pacing. Each tick is armed only after the previous one
//! has finished, so ticks never overlap; stopping clears the armed deadline
//! so no tick can run afterwards.

use crate::timer::Deferred;
use std::time::Duration;
use tokio::time::Instant;

/// One tick as seen by the work it drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    /// Zero-based tick number since the loop started
    pub index: u64,
    /// Time since the previous tick (zero for the first)
    pub delta: Duration,
    /// True on every `side_every`-th tick, starting with the first
    pub side_activity: bool,
}

/// Monotonic tick counter with delta-time bookkeeping; the smoothed frame
/// rate lives in the diagnostics store
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    ticks: u64,
    last_tick: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record a tick at `now`; returns (index, delta)
    pub fn advance(&mut self, now: Instant) -> (u64, Duration) {
        let index = self.ticks;
        let delta = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();

        self.ticks += 1;
        self.last_tick = Some(now);
        (index, delta)
    }

    /// Ticks recorded since the last reset
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// Paces frame work with a single re-armed deadline
#[derive(Debug)]
pub struct FrameScheduler {
    interval: Duration,
    side_every: u64,
    running: bool,
    timer: Deferred,
    clock: FrameClock,
}

impl FrameScheduler {
    /// `side_every` of 0 disables the side activity
    pub fn new(interval: Duration, side_every: u64) -> Self {
        Self {
            interval,
            side_every,
            running: false,
            timer: Deferred::new(),
            clock: FrameClock::new(),
        }
    }

    /// Start the loop with an immediate first tick. No-op if already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        tracing::debug!(interval_ms = self.interval.as_millis() as u64, "Frame loop started");
        self.running = true;
        self.clock.reset();
        self.timer.arm(Duration::ZERO);
        true
    }

    /// Stop the loop and clear the armed tick. Returns true if it was running.
    pub fn stop(&mut self) -> bool {
        self.timer.cancel();
        let was_running = std::mem::replace(&mut self.running, false);
        if was_running {
            tracing::debug!(ticks = self.clock.ticks(), "Frame loop stopped");
        }
        was_running
    }

    /// Resolves when the next tick is due; pends while stopped
    pub async fn wait(&mut self) {
        self.timer.fired().await;
    }

    /// Open a tick. `None` if the loop was stopped in the meantime.
    pub fn begin_tick(&mut self) -> Option<FrameTick> {
        if !self.running {
            return None;
        }
        let (index, delta) = self.clock.advance(Instant::now());
        let side_activity = self.side_every > 0 && index % self.side_every == 0;
        Some(FrameTick {
            index,
            delta,
            side_activity,
        })
    }

    /// Close a tick by arming the next one, unless stopped during the tick
    pub fn end_tick(&mut self) {
        if self.running {
            self.timer.arm(self.interval);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True while a future tick is scheduled
    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let mut scheduler = FrameScheduler::new(Duration::from_millis(33), 30);
        assert!(scheduler.start());
        assert!(!scheduler.start());

        let started = Instant::now();
        scheduler.wait().await;
        assert!(started.elapsed() < Duration::from_millis(2));

        let tick = scheduler.begin_tick().unwrap();
        assert_eq!(tick.index, 0);
        assert!(tick.side_activity);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_paced() {
        let mut scheduler = FrameScheduler::new(Duration::from_millis(33), 30);
        scheduler.start();

        for expected in 0..5u64 {
            scheduler.wait().await;
            let tick = scheduler.begin_tick().unwrap();
            assert_eq!(tick.index, expected);
            if expected > 0 {
                assert!(tick.delta >= Duration::from_millis(33));
                assert!(tick.delta < Duration::from_millis(35));
            }
            scheduler.end_tick();
        }
        assert_eq!(scheduler.clock().ticks(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_side_activity_every_thirtieth_tick() {
        let mut scheduler = FrameScheduler::new(Duration::from_millis(1), 30);
        scheduler.start();

        let mut side = Vec::new();
        for _ in 0..61 {
            scheduler.wait().await;
            let tick = scheduler.begin_tick().unwrap();
            if tick.side_activity {
                side.push(tick.index);
            }
            scheduler.end_tick();
        }
        assert_eq!(side, vec![0, 30, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_armed_tick() {
        let mut scheduler = FrameScheduler::new(Duration::from_millis(33), 30);
        scheduler.start();
        assert!(scheduler.is_armed());

        assert!(scheduler.stop());
        assert!(!scheduler.is_armed());
        assert!(scheduler.begin_tick().is_none());

        let waited = tokio::time::timeout(Duration::from_secs(5), scheduler.wait()).await;
        assert!(waited.is_err(), "no tick may fire after stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_tick_prevents_rearm() {
        let mut scheduler = FrameScheduler::new(Duration::from_millis(33), 30);
        scheduler.start();
        scheduler.wait().await;
        scheduler.begin_tick().unwrap();

        scheduler.stop();
        scheduler.end_tick();
        assert!(!scheduler.is_armed());
    }
}
