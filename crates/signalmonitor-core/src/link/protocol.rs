//! Wire protocol
//!
//! JSON text frames. Outbound requests are enveloped as
//! `{"type": ..., "data": ..., "timestamp": <unix ms>}`; inbound messages are
//! discriminated by their `type` field.

use crate::link::connection::ConnectionState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outbound request type for oscilloscope samples
pub const OSC_REQUEST: &str = "osc_request";

/// Outbound request type for spectrum bins
pub const FFT_REQUEST: &str = "fft_request";

/// Malformed inbound payloads
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Empty message")]
    Empty,

    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Envelope wrapped around every outbound payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: T,
    /// Unix epoch milliseconds at send time
    pub timestamp: i64,
}

/// Payload of an acquisition request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestPayload {
    /// Number of time-domain points wanted
    Points { points: usize },
    /// Number of spectrum bins wanted
    Bins { bins: usize },
}

/// Message received from the instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Amplitude samples for the oscilloscope view
    OscData { data: Option<Vec<f32>> },
    /// Magnitude bins for the spectrum view
    FftData { data: Option<Vec<f32>> },
    /// Status indicator override
    Led { status: Option<ConnectionState> },
    /// Sampling-rate suggestion (Hz)
    Slider { value: Option<f64> },
    /// Any other `type`; ignored
    #[serde(other)]
    Unknown,
}

/// Serialize `payload` into an outbound text frame
pub fn encode<T: Serialize>(kind: &str, payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope {
        kind: kind.to_string(),
        data: payload,
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
}

/// Parse an inbound text frame
pub fn parse_inbound(text: &str) -> Result<InboundMessage, ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}
