//! Counters and a bounded event log for the debug view
//!
//! Fed by the session task; never consulted by the acquisition logic.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Maximum number of entries kept in the event log
const MAX_EVENT_LOG: usize = 100;

/// Maximum number of disconnection events kept
const MAX_DISCONNECTIONS: usize = 100;

/// Weight of the newest frame in the smoothed fps figure
const FPS_SMOOTHING: f64 = 0.1;

/// A disconnection with the reconnect it scheduled
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisconnectionEvent {
    /// When the link was lost
    pub timestamp: DateTime<Utc>,
    /// Reconnect attempt number scheduled in response (0 if none)
    pub attempt: u32,
    /// Delay of the scheduled reconnect in milliseconds (0 if none)
    pub delay_ms: u64,
}

/// One line of the debug event log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Running counters
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Counters {
    /// Frames presented to the surface
    pub frames_rendered: u64,
    /// Frames that carried no sample data (grid only)
    pub degenerate_frames: u64,
    /// Acquisition requests written to the link
    pub requests_sent: u64,
    /// Acquisition requests skipped because the link was not connected
    pub requests_dropped: u64,
    /// Inbound messages that changed session state
    pub inbound_applied: u64,
    /// Inbound data replies discarded for a mode mismatch or missing data
    pub inbound_discarded: u64,
    /// Inbound text that could not be parsed
    pub inbound_malformed: u64,
    /// True once the reconnect budget has been spent
    pub retries_exhausted: bool,
}

/// Diagnostics collected over the lifetime of a session
#[derive(Debug, Clone)]
pub struct DiagnosticsStore {
    counters: Counters,
    disconnections: VecDeque<DisconnectionEvent>,
    log: VecDeque<LogEntry>,
    fps: f64,
}

impl DiagnosticsStore {
    pub fn new() -> Self {
        Self {
            counters: Counters::default(),
            disconnections: VecDeque::with_capacity(MAX_DISCONNECTIONS),
            log: VecDeque::with_capacity(MAX_EVENT_LOG),
            fps: 0.0,
        }
    }

    /// Record a presented frame
    ///
    /// # Arguments
    /// * `has_data` - Whether the frame drew samples beyond the grid
    /// * `delta_secs` - Time since the previous frame (0 for the first)
    pub fn record_frame(&mut self, has_data: bool, delta_secs: f64) {
        self.counters.frames_rendered += 1;
        if !has_data {
            self.counters.degenerate_frames += 1;
        }

        if delta_secs > 0.0 && delta_secs.is_finite() {
            let instant = 1.0 / delta_secs;
            self.fps = if self.fps == 0.0 {
                instant
            } else {
                self.fps + (instant - self.fps) * FPS_SMOOTHING
            };
        }
    }

    pub fn record_request(&mut self, sent: bool) {
        if sent {
            self.counters.requests_sent += 1;
        } else {
            self.counters.requests_dropped += 1;
        }
    }

    pub fn record_applied(&mut self) {
        self.counters.inbound_applied += 1;
    }

    pub fn record_discarded(&mut self) {
        self.counters.inbound_discarded += 1;
    }

    pub fn record_malformed(&mut self, detail: &str) {
        self.counters.inbound_malformed += 1;
        self.log(format!("Malformed message: {}", detail));
    }

    /// Record a lost link and the reconnect it triggered
    pub fn record_disconnection(&mut self, attempt: u32, delay_ms: u64) {
        if self.disconnections.len() >= MAX_DISCONNECTIONS {
            self.disconnections.pop_front();
        }
        self.disconnections.push_back(DisconnectionEvent {
            timestamp: Utc::now(),
            attempt,
            delay_ms,
        });
    }

    pub fn record_exhausted(&mut self, attempts: u32) {
        self.counters.retries_exhausted = true;
        self.log(format!("Reconnect gave up after {} attempts", attempts));
    }

    /// Clear the exhausted flag after an operator reconnect
    pub fn clear_exhausted(&mut self) {
        self.counters.retries_exhausted = false;
    }

    /// Append a line to the event log, evicting the oldest when full
    pub fn log(&mut self, message: impl Into<String>) {
        if self.log.len() >= MAX_EVENT_LOG {
            self.log.pop_front();
        }
        self.log.push_back(LogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn disconnections(&self) -> &VecDeque<DisconnectionEvent> {
        &self.disconnections
    }

    pub fn event_log(&self) -> &VecDeque<LogEntry> {
        &self.log
    }

    /// Smoothed frames per second
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl Default for DiagnosticsStore {
    fn default() -> Self {
        Self::new()
    }
}
