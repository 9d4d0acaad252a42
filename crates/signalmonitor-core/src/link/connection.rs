//! Connection lifecycle management
//!
//! State machine over Disconnected → Connecting → Connected with a linear
//! reconnect backoff. A close from any state drops back to Disconnected and
//! schedules the next attempt; once the attempt budget is spent the manager
//! stays Disconnected until an operator restarts it.

use super::protocol::{self, InboundMessage, ProtocolError};
use super::transport::{Connector, Link, LinkEvent, LinkEventKind, LinkEventSender};
use super::LinkError;
use crate::events::{Notification, Notifier};
use crate::timer::Deferred;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection state of the instrument link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No socket; a reconnect may be pending
    Disconnected,
    /// Socket created, handshake in progress
    Connecting,
    /// Handshake complete, requests flow
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
        };
        f.write_str(label)
    }
}

/// Linear reconnect backoff: attempt `n` waits `n × base_delay`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base_delay,
        }
    }

    /// Delay before attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Consume one attempt and return its delay, or `None` once the budget
    /// is spent. The counter never exceeds `max_attempts`.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.delay_for(self.attempts))
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(2000))
    }
}

/// Owns the socket, its state, and the reconnect timer
pub struct ConnectionManager {
    endpoint: String,
    state: ConnectionState,
    policy: ReconnectPolicy,
    connector: Box<dyn Connector>,
    events: LinkEventSender,
    link: Option<Box<dyn Link>>,
    /// Id of the most recently opened link; events for other ids are stale
    link_id: u64,
    reconnect_timer: Deferred,
    exhausted: bool,
    notifier: Notifier,
}

impl ConnectionManager {
    pub fn new(
        endpoint: impl Into<String>,
        policy: ReconnectPolicy,
        connector: Box<dyn Connector>,
        events: LinkEventSender,
        notifier: Notifier,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            state: ConnectionState::Disconnected,
            policy,
            connector,
            events,
            link: None,
            link_id: 0,
            reconnect_timer: Deferred::new(),
            exhausted: false,
            notifier,
        }
    }

    /// Open a link unless one is already connecting or connected
    pub fn connect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = ?self.state, "connect() ignored, link already active");
            return;
        }

        self.reconnect_timer.cancel();
        self.link_id += 1;
        let link_id = self.link_id;

        tracing::info!(endpoint = %self.endpoint, link = link_id, "Opening instrument link");
        match self
            .connector
            .open(&self.endpoint, link_id, self.events.clone())
        {
            Ok(link) => {
                self.link = Some(link);
                self.set_state(ConnectionState::Connecting);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to open instrument link");
                self.schedule_reconnect();
            }
        }
    }

    /// Operator-initiated connect: starts a fresh reconnect budget
    pub fn restart(&mut self) {
        self.policy.reset();
        self.exhausted = false;
        self.connect();
    }

    /// Apply one transport event.
    ///
    /// Returns the parsed message for inbound text frames. Malformed frames
    /// are logged and returned as errors for bookkeeping; they never change
    /// the connection state.
    pub fn handle_event(
        &mut self,
        event: LinkEvent,
    ) -> Result<Option<InboundMessage>, ProtocolError> {
        if event.link != self.link_id || self.link.is_none() {
            tracing::debug!(link = event.link, current = self.link_id, "Ignoring event from stale link");
            return Ok(None);
        }

        match event.kind {
            LinkEventKind::Opened => {
                tracing::info!(link = event.link, "Instrument link connected");
                self.policy.reset();
                self.exhausted = false;
                self.set_state(ConnectionState::Connected);
                Ok(None)
            }
            LinkEventKind::Message(text) => match protocol::parse_inbound(&text) {
                Ok(message) => Ok(Some(message)),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed message");
                    Err(e)
                }
            },
            LinkEventKind::Error(reason) => {
                // The close that follows drives the transition
                tracing::warn!(link = event.link, %reason, "Instrument link error");
                Ok(None)
            }
            LinkEventKind::Closed => {
                tracing::info!(link = event.link, "Instrument link closed");
                self.link = None;
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
                Ok(None)
            }
        }
    }

    /// Arm the reconnect timer for the next attempt.
    ///
    /// Returns the delay of the outstanding timer, or `None` when the attempt
    /// budget is exhausted. Never arms a second timer.
    pub fn schedule_reconnect(&mut self) -> Option<Duration> {
        if self.reconnect_timer.is_armed() {
            return self.reconnect_timer.delay();
        }

        match self.policy.next_delay() {
            Some(delay) => {
                tracing::info!(
                    attempt = self.policy.attempts(),
                    max_attempts = self.policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                self.reconnect_timer.arm(delay);
                Some(delay)
            }
            None => {
                if !self.exhausted {
                    tracing::error!(
                        attempts = self.policy.attempts(),
                        "Max reconnection attempts reached, giving up"
                    );
                    self.exhausted = true;
                    self.notifier.notify(Notification::RetriesExhausted {
                        attempts: self.policy.attempts(),
                    });
                }
                None
            }
        }
    }

    /// Resolves when the reconnect timer fires; pends while none is armed
    pub async fn reconnect_due(&mut self) {
        self.reconnect_timer.fired().await;
    }

    /// Send `{type, data, timestamp}` if connected; dropped otherwise
    pub fn send<T: Serialize>(&mut self, kind: &str, payload: &T) -> Result<(), LinkError> {
        if self.state != ConnectionState::Connected {
            tracing::debug!(kind, "Link not connected, request dropped");
            return Err(LinkError::NotConnected);
        }
        let link = self.link.as_mut().ok_or(LinkError::NotConnected)?;

        let text = protocol::encode(kind, payload)?;
        if let Err(e) = link.send_text(text) {
            tracing::warn!(kind, error = %e, "Failed to send request");
            return Err(e);
        }
        tracing::debug!(kind, "Request sent");
        Ok(())
    }

    /// Cancel the reconnect timer and close the link without scheduling a
    /// reconnect. Safe from any state.
    pub fn teardown(&mut self) {
        if self.reconnect_timer.cancel() {
            tracing::debug!("Pending reconnect cancelled");
        }
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?state, "Connection state change");
        self.state = state;
        self.notifier.notify(Notification::Connection(state));
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn attempts(&self) -> u32 {
        self.policy.attempts()
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// True once a reconnect was refused for lack of attempts
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Delay of the outstanding reconnect timer
    pub fn pending_reconnect(&self) -> Option<Duration> {
        self.reconnect_timer.delay()
    }

    /// Id of the current (or last) link
    pub fn link_id(&self) -> u64 {
        self.link_id
    }
}
