//! Session notifications
//!
//! Every externally visible transition (connection state, acquisition mode,
//! sample buffer, sampling rate, status indicator) is broadcast as a typed
//! [`Notification`]. UI layers subscribe and react; they hold no logic.

use crate::acquisition::controller::{AcquisitionMode, SampleBuffer};
use crate::link::connection::ConnectionState;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the notification channel. Slow subscribers observe `Lagged`.
const NOTIFICATION_CAPACITY: usize = 256;

/// A state change emitted by the session core
#[derive(Debug, Clone)]
pub enum Notification {
    /// True connection state changed
    Connection(ConnectionState),
    /// Reconnect attempts are used up; only an operator connect retries
    RetriesExhausted { attempts: u32 },
    /// Acquisition mode changed
    Mode(AcquisitionMode),
    /// Sample buffer was replaced (`None` when cleared)
    Buffer(Option<Arc<SampleBuffer>>),
    /// Sampling-rate control changed (Hz)
    SamplingRate(u32),
    /// Displayed status indicator changed
    Indicator(ConnectionState),
}

/// Cloneable sender half shared by the session components
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self { tx }
    }

    /// Publish a notification; a send with no subscribers is not an error
    pub fn notify(&self, notification: Notification) {
        if self.tx.receiver_count() == 0 {
            return;
        }
        let _ = self.tx.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
