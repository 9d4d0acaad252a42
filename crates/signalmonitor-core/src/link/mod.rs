//! Instrument link
//!
//! - Wire message types and codec ([`protocol`])
//! - Socket abstraction and the WebSocket implementation ([`transport`])
//! - Connection lifecycle and reconnect policy ([`connection`])

pub mod connection;
pub mod protocol;
pub mod transport;

use thiserror::Error;

/// Errors raised on the outbound side of the link
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Link is not connected")]
    NotConnected,

    #[error("Link closed")]
    Closed,

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
