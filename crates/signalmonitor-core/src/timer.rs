//! Cancellable one-shot timers
//!
//! The session loop is single-threaded, so deferred work (the next frame
//! tick, the next reconnect attempt) is modelled as an owned, armable sleep
//! rather than a spawned task. Cancelling drops the sleep; a cancelled timer
//! can never fire.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Sleep};

/// A single deferred deadline with an explicit handle.
///
/// At most one deadline is outstanding; arming again replaces it.
#[derive(Debug, Default)]
pub struct Deferred {
    sleep: Option<Pin<Box<Sleep>>>,
    delay: Duration,
}

impl Deferred {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to fire `delay` from now
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, delay: Duration) {
        self.sleep = Some(Box::pin(sleep(delay)));
        self.delay = delay;
    }

    /// Clear the handle. Returns true if a deadline was outstanding.
    pub fn cancel(&mut self) -> bool {
        self.sleep.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Delay the timer was armed with, if it is armed
    pub fn delay(&self) -> Option<Duration> {
        self.sleep.as_ref().map(|_| self.delay)
    }

    /// Wait for the deadline, disarming the timer once it passes.
    ///
    /// Pends forever while disarmed. Cancel safe: dropping the future keeps
    /// the deadline armed.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(deadline) => {
                deadline.as_mut().await;
                self.sleep = None;
            }
            None => pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let mut timer = Deferred::new();
        timer.arm(Duration::from_millis(2000));
        assert_eq!(timer.delay(), Some(Duration::from_millis(2000)));

        let start = Instant::now();
        timer.fired().await;
        assert!(start.elapsed() >= Duration::from_millis(2000));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let mut timer = Deferred::new();
        timer.arm(Duration::from_millis(10));
        assert!(timer.cancel());
        assert!(!timer.cancel());

        let result = tokio::time::timeout(Duration::from_secs(60), timer.fired()).await;
        assert!(result.is_err(), "disarmed timer must pend");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_deadline() {
        let mut timer = Deferred::new();
        timer.arm(Duration::from_secs(10));
        timer.arm(Duration::from_millis(5));

        let start = Instant::now();
        timer.fired().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
