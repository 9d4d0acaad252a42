//! Signalmonitor Core - real-time acquisition pipeline for a remote instrument
//!
//! This library drives a single oscilloscope/spectrum view from a remote
//! instrument reached over a persistent WebSocket. It owns the connection
//! lifecycle (reconnect with linear backoff), the acquisition mode state
//! machine, the ~30 Hz frame scheduler, and the data-to-pixel mapping used to
//! draw the current sample buffer. A synthesized signal keeps the view alive
//! whenever live data is missing.

pub mod acquisition;
pub mod config;
pub mod events;
pub mod link;
pub mod render;
pub mod session;
pub mod stats;
pub mod synth;
pub mod timer;

pub use acquisition::controller::{AcquisitionController, AcquisitionMode, BufferSource, SampleBuffer};
pub use acquisition::scheduler::{FrameClock, FrameScheduler};
pub use config::SessionConfig;
pub use events::{Notification, Notifier};
pub use link::connection::{ConnectionManager, ConnectionState, ReconnectPolicy};
pub use render::pipeline::{Frame, RenderPipeline, Surface, Viewport};
pub use session::{AcquisitionSession, SessionHandle};
pub use stats::store::DiagnosticsStore;
pub use synth::SignalSynthesizer;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (YYYY-MM-DD) stamped by build.rs
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Internal sampling rate of the synthesized oscillogram (15 kHz)
pub const SYNTH_SAMPLE_RATE: f32 = 15_000.0;

/// Frequency span covered by the synthesized spectrum (Hz)
pub const SYNTH_MAX_FREQUENCY: f32 = 1_500.0;
