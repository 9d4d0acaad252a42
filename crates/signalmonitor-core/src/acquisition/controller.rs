//! Acquisition mode state machine
//!
//! The controller is the single writer of the sample buffer. Mode changes
//! only happen through [`AcquisitionController::start`] and
//! [`AcquisitionController::stop`]; each clears the buffer so samples from
//! one mode are never rendered under another.

use super::rate::SamplingRate;
use crate::config::SessionConfig;
use crate::events::{Notification, Notifier};
use crate::link::connection::ConnectionState;
use crate::link::protocol::{InboundMessage, RequestPayload, FFT_REQUEST, OSC_REQUEST};
use crate::synth::SignalSynthesizer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Sampling rate assumed for a `slider` message without a value (Hz)
const DEFAULT_SLIDER_RATE: f64 = 1000.0;

/// Acquisition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    #[default]
    Idle,
    /// Time-domain oscilloscope
    Osc,
    /// Frequency-domain spectrum
    Fft,
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AcquisitionMode::Idle => "---",
            AcquisitionMode::Osc => "OSC",
            AcquisitionMode::Fft => "FFT",
        })
    }
}

impl FromStr for AcquisitionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(AcquisitionMode::Idle),
            "osc" => Ok(AcquisitionMode::Osc),
            "fft" => Ok(AcquisitionMode::Fft),
            other => Err(format!("Unknown acquisition mode: {}", other)),
        }
    }
}

/// Where a sample buffer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSource {
    Synthesized,
    Live,
}

/// Samples for one mode, replaced wholesale on every update
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    mode: AcquisitionMode,
    source: BufferSource,
    samples: Vec<f32>,
}

impl SampleBuffer {
    pub fn new(mode: AcquisitionMode, source: BufferSource, samples: Vec<f32>) -> Self {
        Self {
            mode,
            source,
            samples,
        }
    }

    /// Mode the samples were produced for
    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn source(&self) -> BufferSource {
        self.source
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A request the controller wants sent to the instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionRequest {
    pub kind: &'static str,
    pub payload: RequestPayload,
}

/// Outcome of applying one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Live samples replaced the buffer
    Buffer,
    /// Samples for a mode other than the active one (or none at all)
    Discarded,
    /// Status indicator overwritten
    Indicator,
    /// Sampling-rate control updated (or already at that value)
    SamplingRate,
    /// Unrecognised message type
    Ignored,
}

/// Owns the acquisition mode and the current sample buffer
pub struct AcquisitionController {
    mode: AcquisitionMode,
    buffer: Option<Arc<SampleBuffer>>,
    synth: SignalSynthesizer,
    osc_points: usize,
    fft_bins: usize,
    rate: SamplingRate,
    /// Displayed connection indicator; not the true link state
    indicator: ConnectionState,
    notifier: Notifier,
}

impl AcquisitionController {
    pub fn new(config: &SessionConfig, synth: SignalSynthesizer, notifier: Notifier) -> Self {
        Self {
            mode: AcquisitionMode::Idle,
            buffer: None,
            synth,
            osc_points: config.osc_points,
            fft_bins: config.fft_bins,
            rate: SamplingRate::new(
                config.sampling_rate,
                config.sampling_rate_min,
                config.sampling_rate_max,
                config.sampling_rate_step,
            ),
            indicator: ConnectionState::Disconnected,
            notifier,
        }
    }

    /// Enter `mode`, discarding any previous buffer and phase state.
    ///
    /// Starting `Idle` is the same as [`stop`](Self::stop).
    pub fn start(&mut self, mode: AcquisitionMode) {
        if mode == AcquisitionMode::Idle {
            self.stop();
            return;
        }

        tracing::info!(%mode, "Acquisition started");
        self.synth.reset();
        self.clear_buffer();
        self.set_mode(mode);
    }

    /// Return to `Idle` and clear the buffer
    pub fn stop(&mut self) {
        if self.mode != AcquisitionMode::Idle {
            tracing::info!(mode = %self.mode, "Acquisition stopped");
        }
        self.clear_buffer();
        self.set_mode(AcquisitionMode::Idle);
    }

    /// Per-tick refresh: replace the buffer with synthesized samples for the
    /// active mode and return the live request to send alongside.
    ///
    /// Returns `None` while idle.
    pub fn refresh(&mut self) -> Option<AcquisitionRequest> {
        let (samples, request) = match self.mode {
            AcquisitionMode::Idle => return None,
            AcquisitionMode::Osc => (
                self.synth.generate_oscillogram(self.osc_points),
                AcquisitionRequest {
                    kind: OSC_REQUEST,
                    payload: RequestPayload::Points {
                        points: self.osc_points,
                    },
                },
            ),
            AcquisitionMode::Fft => (
                self.synth.generate_spectrum(self.fft_bins),
                AcquisitionRequest {
                    kind: FFT_REQUEST,
                    payload: RequestPayload::Bins {
                        bins: self.fft_bins,
                    },
                },
            ),
        };

        self.replace_buffer(SampleBuffer::new(
            self.mode,
            BufferSource::Synthesized,
            samples,
        ));
        Some(request)
    }

    /// Apply an inbound instrument message.
    ///
    /// Data for a mode other than the active one is discarded. Live data
    /// overwrites whatever buffer is current (most recent wins).
    pub fn apply(&mut self, message: InboundMessage) -> Applied {
        match message {
            InboundMessage::OscData { data } => self.apply_live(AcquisitionMode::Osc, data),
            InboundMessage::FftData { data } => self.apply_live(AcquisitionMode::Fft, data),
            InboundMessage::Led { status } => {
                self.set_indicator(status.unwrap_or(ConnectionState::Connected));
                Applied::Indicator
            }
            InboundMessage::Slider { value } => {
                self.set_sampling_rate(value.unwrap_or(DEFAULT_SLIDER_RATE));
                Applied::SamplingRate
            }
            InboundMessage::Unknown => Applied::Ignored,
        }
    }

    fn apply_live(&mut self, mode: AcquisitionMode, data: Option<Vec<f32>>) -> Applied {
        if self.mode != mode {
            tracing::debug!(active = %self.mode, received = %mode, "Discarding data for inactive mode");
            return Applied::Discarded;
        }
        let Some(samples) = data else {
            tracing::debug!(%mode, "Data message without samples");
            return Applied::Discarded;
        };

        tracing::debug!(%mode, len = samples.len(), "Live buffer received");
        self.replace_buffer(SampleBuffer::new(mode, BufferSource::Live, samples));
        Applied::Buffer
    }

    /// Set the sampling-rate control; returns the applied value (Hz)
    pub fn set_sampling_rate(&mut self, hz: f64) -> u32 {
        if self.rate.set(hz) {
            tracing::info!(rate = self.rate.value(), "Sampling rate changed");
            self.notifier
                .notify(Notification::SamplingRate(self.rate.value()));
        }
        self.rate.value()
    }

    /// Overwrite the displayed status indicator
    pub fn set_indicator(&mut self, status: ConnectionState) {
        if self.indicator == status {
            return;
        }
        self.indicator = status;
        self.notifier.notify(Notification::Indicator(status));
    }

    /// Advance the simulated indicator one step:
    /// disconnected → connecting → connected → disconnected
    pub fn cycle_indicator(&mut self) -> ConnectionState {
        let next = match self.indicator {
            ConnectionState::Disconnected => ConnectionState::Connecting,
            ConnectionState::Connecting => ConnectionState::Connected,
            ConnectionState::Connected => ConnectionState::Disconnected,
        };
        self.set_indicator(next);
        next
    }

    /// Stable reference to the current buffer for one render pass
    pub fn snapshot(&self) -> Option<Arc<SampleBuffer>> {
        self.buffer.clone()
    }

    fn replace_buffer(&mut self, buffer: SampleBuffer) {
        let buffer = Arc::new(buffer);
        self.buffer = Some(Arc::clone(&buffer));
        self.notifier.notify(Notification::Buffer(Some(buffer)));
    }

    fn clear_buffer(&mut self) {
        if self.buffer.take().is_some() {
            self.notifier.notify(Notification::Buffer(None));
        }
    }

    fn set_mode(&mut self, mode: AcquisitionMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        self.notifier.notify(Notification::Mode(mode));
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn sampling_rate(&self) -> u32 {
        self.rate.value()
    }

    pub fn indicator(&self) -> ConnectionState {
        self.indicator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> AcquisitionController {
        AcquisitionController::new(
            &SessionConfig::default(),
            SignalSynthesizer::with_seed(11),
            Notifier::new(),
        )
    }

    #[test]
    fn test_starts_idle_without_buffer() {
        let mut ctl = controller();
        assert_eq!(ctl.mode(), AcquisitionMode::Idle);
        assert!(ctl.snapshot().is_none());
        assert!(ctl.refresh().is_none());
    }

    #[test]
    fn test_refresh_synthesizes_and_requests() {
        let mut ctl = controller();
        ctl.start(AcquisitionMode::Osc);
        assert!(ctl.snapshot().is_none());

        let request = ctl.refresh().unwrap();
        assert_eq!(request.kind, OSC_REQUEST);
        assert_eq!(request.payload, RequestPayload::Points { points: 768 });

        let buffer = ctl.snapshot().unwrap();
        assert_eq!(buffer.mode(), AcquisitionMode::Osc);
        assert_eq!(buffer.source(), BufferSource::Synthesized);
        assert_eq!(buffer.len(), 768);

        ctl.start(AcquisitionMode::Fft);
        assert!(ctl.snapshot().is_none(), "mode switch clears the buffer");
        let request = ctl.refresh().unwrap();
        assert_eq!(request.payload, RequestPayload::Bins { bins: 384 });
        assert_eq!(ctl.snapshot().unwrap().len(), 384);
    }

    #[test]
    fn test_live_data_overwrites_matching_mode() {
        let mut ctl = controller();
        ctl.start(AcquisitionMode::Osc);
        ctl.refresh();

        let applied = ctl.apply(InboundMessage::OscData {
            data: Some(vec![0.1, 0.2, 0.3]),
        });
        assert_eq!(applied, Applied::Buffer);
        let buffer = ctl.snapshot().unwrap();
        assert_eq!(buffer.source(), BufferSource::Live);
        assert_eq!(buffer.samples(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_mismatched_mode_is_discarded() {
        let mut ctl = controller();
        ctl.start(AcquisitionMode::Osc);
        ctl.refresh();
        let before = ctl.snapshot().unwrap();

        let applied = ctl.apply(InboundMessage::FftData {
            data: Some(vec![0.5; 384]),
        });
        assert_eq!(applied, Applied::Discarded);
        assert_eq!(ctl.snapshot().unwrap(), before);
    }

    #[test]
    fn test_stop_clears_and_ignores_late_data() {
        let mut ctl = controller();
        ctl.start(AcquisitionMode::Fft);
        ctl.refresh();
        ctl.stop();

        assert_eq!(ctl.mode(), AcquisitionMode::Idle);
        assert!(ctl.snapshot().is_none());
        assert_eq!(
            ctl.apply(InboundMessage::FftData {
                data: Some(vec![1.0])
            }),
            Applied::Discarded
        );
        assert_eq!(
            ctl.apply(InboundMessage::OscData {
                data: Some(vec![1.0])
            }),
            Applied::Discarded
        );
        assert!(ctl.snapshot().is_none());
    }

    #[test]
    fn test_data_without_samples_is_discarded() {
        let mut ctl = controller();
        ctl.start(AcquisitionMode::Osc);
        assert_eq!(
            ctl.apply(InboundMessage::OscData { data: None }),
            Applied::Discarded
        );
        assert!(ctl.snapshot().is_none());
    }

    #[test]
    fn test_led_and_slider_messages() {
        let mut ctl = controller();
        assert_eq!(
            ctl.apply(InboundMessage::Led {
                status: Some(ConnectionState::Connecting)
            }),
            Applied::Indicator
        );
        assert_eq!(ctl.indicator(), ConnectionState::Connecting);

        ctl.apply(InboundMessage::Led { status: None });
        assert_eq!(ctl.indicator(), ConnectionState::Connected);

        ctl.apply(InboundMessage::Slider {
            value: Some(4_230.0),
        });
        assert_eq!(ctl.sampling_rate(), 4_200);

        ctl.apply(InboundMessage::Slider { value: None });
        assert_eq!(ctl.sampling_rate(), 1_000);

        assert_eq!(ctl.apply(InboundMessage::Unknown), Applied::Ignored);
    }

    #[test]
    fn test_indicator_cycle() {
        let mut ctl = controller();
        assert_eq!(ctl.cycle_indicator(), ConnectionState::Connecting);
        assert_eq!(ctl.cycle_indicator(), ConnectionState::Connected);
        assert_eq!(ctl.cycle_indicator(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_notifications_on_transitions() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let mut ctl = AcquisitionController::new(
            &SessionConfig::default(),
            SignalSynthesizer::with_seed(3),
            notifier,
        );

        ctl.start(AcquisitionMode::Osc);
        ctl.refresh();
        ctl.stop();

        assert!(matches!(rx.try_recv(), Ok(Notification::Mode(AcquisitionMode::Osc))));
        assert!(matches!(rx.try_recv(), Ok(Notification::Buffer(Some(_)))));
        assert!(matches!(rx.try_recv(), Ok(Notification::Buffer(None))));
        assert!(matches!(rx.try_recv(), Ok(Notification::Mode(AcquisitionMode::Idle))));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("osc".parse::<AcquisitionMode>(), Ok(AcquisitionMode::Osc));
        assert_eq!("FFT".parse::<AcquisitionMode>(), Ok(AcquisitionMode::Fft));
        assert!("scope".parse::<AcquisitionMode>().is_err());
    }
}
