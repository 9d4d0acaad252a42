//! Signalmonitor - live instrument-monitoring client
//!
//! This library re-exports the acquisition pipeline from
//! `signalmonitor-core` and the mock instrument from `signalmonitor-server`.

pub use signalmonitor_core::{acquisition, config, events, link, render, session, stats, synth, timer};

pub use signalmonitor_core::{
    AcquisitionController, AcquisitionMode, AcquisitionSession, BufferSource, ConnectionManager,
    ConnectionState, DiagnosticsStore, Frame, FrameClock, FrameScheduler, Notification, Notifier,
    ReconnectPolicy, RenderPipeline, SampleBuffer, SessionConfig, SessionHandle, SignalSynthesizer,
    Surface, Viewport,
};
pub use signalmonitor_core::{BUILD_DATE, SYNTH_MAX_FREQUENCY, SYNTH_SAMPLE_RATE, VERSION};

pub use signalmonitor_server as instrument;
