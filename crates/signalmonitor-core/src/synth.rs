//! Synthetic test signal generation
//!
//! Produces placeholder oscillograms and spectra while no live instrument
//! data is available, and as preview data for a running acquisition.

use crate::{SYNTH_MAX_FREQUENCY, SYNTH_SAMPLE_RATE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::ops::RangeInclusive;

/// Primary tone of the synthesized oscillogram (Hz)
const PRIMARY_FREQUENCY: f32 = 500.0;

/// Harmonic tone of the synthesized oscillogram (Hz)
const HARMONIC_FREQUENCY: f32 = 2_000.0;

/// Relative amplitude of the harmonic
const HARMONIC_AMPLITUDE: f32 = 0.5;

/// Peak-to-peak amplitude of the additive oscillogram noise
const OSC_NOISE: f32 = 0.1;

/// Number of bins on each side of a spectral peak that carry energy
const PEAK_SPREAD: i64 = 3;

/// Phase step of the spectrum ripple per call (radians)
const RIPPLE_PHASE_STEP: f32 = 0.1;

/// Amplitude of the slow sinusoidal ripple added to every bin
const RIPPLE_AMPLITUDE: f32 = 0.15;

/// A spectral line of the synthesized spectrum
#[derive(Debug, Clone, Copy)]
struct Peak {
    frequency: f32,
    magnitude: f32,
}

/// Fundamental plus two harmonics
const PEAKS: [Peak; 3] = [
    Peak {
        frequency: 500.0,
        magnitude: 1.0,
    },
    Peak {
        frequency: 1_000.0,
        magnitude: 0.6,
    },
    Peak {
        frequency: 1_500.0,
        magnitude: 0.3,
    },
];

/// Synthetic oscillogram/spectrum generator
///
/// The deterministic shape of each signal is fixed; consecutive calls differ
/// by an internal phase accumulator and by random noise. Phases advance
/// modulo 2π on every call.
#[derive(Debug, Clone)]
pub struct SignalSynthesizer {
    /// Phase of the primary tone at the start of the next oscillogram
    osc_phase: f32,
    /// Phase of the spectrum ripple for the next spectrum
    fft_phase: f32,
    rng: StdRng,
}

impl SignalSynthesizer {
    /// Create a synthesizer seeded from the operating system
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Create a synthesizer with reproducible noise
    ///
    /// # Example
    /// ```
    /// use signalmonitor_core::SignalSynthesizer;
    ///
    /// let mut synth = SignalSynthesizer::with_seed(7);
    /// let trace = synth.generate_oscillogram(768);
    /// assert_eq!(trace.len(), 768);
    /// ```
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            osc_phase: 0.0,
            fft_phase: 0.0,
            rng,
        }
    }

    /// Synthesize `point_count` time-domain samples
    ///
    /// A 500 Hz tone plus a half-amplitude 2 kHz harmonic sampled at 15 kHz,
    /// with uniform noise of ±0.05. The harmonic's phase is locked to the
    /// primary, so consecutive buffers continue the same waveform.
    pub fn generate_oscillogram(&mut self, point_count: usize) -> Vec<f32> {
        let harmonic_ratio = HARMONIC_FREQUENCY / PRIMARY_FREQUENCY;
        let phase = self.osc_phase;

        let samples = (0..point_count)
            .map(|i| {
                let t = i as f32 / SYNTH_SAMPLE_RATE;
                let primary = (TAU * PRIMARY_FREQUENCY * t + phase).sin();
                let harmonic =
                    (TAU * HARMONIC_FREQUENCY * t + phase * harmonic_ratio).sin();
                let noise = (self.rng.random::<f32>() - 0.5) * OSC_NOISE;
                primary + HARMONIC_AMPLITUDE * harmonic + noise
            })
            .collect();

        let advance = TAU * PRIMARY_FREQUENCY * point_count as f32 / SYNTH_SAMPLE_RATE;
        self.osc_phase = (self.osc_phase + advance).rem_euclid(TAU);
        samples
    }

    /// Synthesize `bin_count` normalized magnitude bins over 0..1.5 kHz
    ///
    /// Each peak spreads over ±3 bins with linearly decaying magnitude; every
    /// bin is then scaled by a random factor in [0.8, 1.2) and offset by a
    /// slow ripple of amplitude 0.15. Bins inside a peak region never go
    /// below 0; elsewhere the ripple may dip below 0, and peaks may exceed 1.
    pub fn generate_spectrum(&mut self, bin_count: usize) -> Vec<f32> {
        let mut bins = vec![0.0f32; bin_count];
        if bin_count == 0 {
            return bins;
        }

        let bin_width = SYNTH_MAX_FREQUENCY / bin_count as f32;
        for peak in PEAKS {
            let center = (peak.frequency / bin_width).floor() as i64;
            for offset in -PEAK_SPREAD..=PEAK_SPREAD {
                let idx = center + offset;
                if idx < 0 || idx >= bin_count as i64 {
                    continue;
                }
                let factor = 1.0 - offset.abs() as f32 / (PEAK_SPREAD + 1) as f32;
                let slot = &mut bins[idx as usize];
                *slot = slot.max(peak.magnitude * factor);
            }
        }

        let phase = self.fft_phase;
        for (i, value) in bins.iter_mut().enumerate() {
            let scale = 0.8 + self.rng.random::<f32>() * 0.4;
            let ripple = (phase + i as f32 * 0.1).sin() * RIPPLE_AMPLITUDE;
            *value = *value * scale + ripple;
        }

        for region in Self::peak_regions(bin_count) {
            for value in &mut bins[region] {
                *value = value.max(0.0);
            }
        }

        self.fft_phase = (self.fft_phase + RIPPLE_PHASE_STEP).rem_euclid(TAU);
        bins
    }

    /// Bin index the synthesized spectrum places a peak at, for `bin_count` bins
    pub fn peak_bins(bin_count: usize) -> Vec<usize> {
        if bin_count == 0 {
            return Vec::new();
        }
        let bin_width = SYNTH_MAX_FREQUENCY / bin_count as f32;
        PEAKS
            .iter()
            .map(|p| (p.frequency / bin_width).floor() as usize)
            .filter(|&idx| idx < bin_count)
            .collect()
    }

    /// Bin ranges (±3 around each peak, cut to `0..bin_count`) that carry
    /// peak energy. A peak whose centre lies past the end still contributes
    /// its lower tail.
    pub fn peak_regions(bin_count: usize) -> Vec<RangeInclusive<usize>> {
        if bin_count == 0 {
            return Vec::new();
        }
        let bin_width = SYNTH_MAX_FREQUENCY / bin_count as f32;
        let last = bin_count as i64 - 1;
        PEAKS
            .iter()
            .filter_map(|p| {
                let center = (p.frequency / bin_width).floor() as i64;
                let lo = (center - PEAK_SPREAD).max(0);
                let hi = (center + PEAK_SPREAD).min(last);
                (lo <= hi).then(|| lo as usize..=hi as usize)
            })
            .collect()
    }

    /// Return both phase accumulators to zero
    pub fn reset(&mut self) {
        self.osc_phase = 0.0;
        self.fft_phase = 0.0;
    }

    /// Current oscillogram phase in [0, 2π)
    pub fn osc_phase(&self) -> f32 {
        self.osc_phase
    }

    /// Current spectrum ripple phase in [0, 2π)
    pub fn fft_phase(&self) -> f32 {
        self.fft_phase
    }
}

impl Default for SignalSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_oscillogram_length() {
        let mut synth = SignalSynthesizer::with_seed(1);
        assert_eq!(synth.generate_oscillogram(768).len(), 768);
        assert_eq!(synth.generate_oscillogram(1).len(), 1);
        assert!(synth.generate_oscillogram(0).is_empty());
    }

    #[test]
    fn test_oscillogram_bounded() {
        let mut synth = SignalSynthesizer::with_seed(2);
        for _ in 0..20 {
            for v in synth.generate_oscillogram(1000) {
                assert!(v.is_finite());
                assert!(v.abs() <= 1.5 + OSC_NOISE / 2.0 + 1e-4, "value {} out of range", v);
            }
        }
    }

    #[test]
    fn test_oscillogram_phase_advances() {
        let mut synth = SignalSynthesizer::with_seed(3);
        assert_eq!(synth.osc_phase(), 0.0);

        // 30 points at 15 kHz is one full 500 Hz period: phase wraps back to ~0
        synth.generate_oscillogram(30);
        assert!(synth.osc_phase() < 1e-3 || (TAU - synth.osc_phase()) < 1e-3);

        synth.generate_oscillogram(15);
        assert_relative_eq!(synth.osc_phase(), std::f32::consts::PI, epsilon = 1e-3);
    }

    #[test]
    fn test_oscillogram_continues_across_buffers() {
        let mut synth = SignalSynthesizer::with_seed(4);
        let first = synth.generate_oscillogram(64);
        let second = synth.generate_oscillogram(64);

        // Neighbouring samples of the 500 Hz + 2 kHz mix move by at most ~0.75 per step
        let jump = (second[0] - first[63]).abs();
        assert!(jump < 1.0, "discontinuity of {} at buffer boundary", jump);
    }

    #[test]
    fn test_spectrum_length_and_finite() {
        let mut synth = SignalSynthesizer::with_seed(5);
        for n in [0usize, 1, 7, 256, 384, 512] {
            let bins = synth.generate_spectrum(n);
            assert_eq!(bins.len(), n);
            assert!(bins.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_spectrum_peaks_bounded() {
        let mut synth = SignalSynthesizer::with_seed(6);
        for _ in 0..500 {
            let bins = synth.generate_spectrum(384);
            for region in SignalSynthesizer::peak_regions(384) {
                for idx in region {
                    assert!(bins[idx] >= 0.0, "peak region bin {} negative: {}", idx, bins[idx]);
                }
            }
            for v in &bins {
                assert!(*v <= 1.4, "bin value {} above 1.4", v);
            }
        }
    }

    #[test]
    fn test_spectrum_peak_positions() {
        // 384 bins over 1.5 kHz: 3.90625 Hz/bin, peaks at 128 and 256; 1.5 kHz falls off the end
        assert_eq!(SignalSynthesizer::peak_bins(384), vec![128, 256]);
        assert!(SignalSynthesizer::peak_bins(0).is_empty());
    }

    #[test]
    fn test_spectrum_peak_regions() {
        // The 1.5 kHz line centres on bin 384, one past the end: only 381..=383 remain
        assert_eq!(
            SignalSynthesizer::peak_regions(384),
            vec![125..=131, 253..=259, 381..=383]
        );
        assert!(SignalSynthesizer::peak_regions(0).is_empty());
    }

    #[test]
    fn test_spectrum_ripple_phase_wraps() {
        let mut synth = SignalSynthesizer::with_seed(8);
        for _ in 0..100 {
            synth.generate_spectrum(16);
            assert!((0.0..TAU).contains(&synth.fft_phase()));
        }
    }

    #[test]
    fn test_reset() {
        let mut synth = SignalSynthesizer::with_seed(9);
        synth.generate_oscillogram(17);
        synth.generate_spectrum(17);
        synth.reset();
        assert_eq!(synth.osc_phase(), 0.0);
        assert_eq!(synth.fft_phase(), 0.0);
    }

    #[test]
    fn test_seeded_generators_match() {
        let mut a = SignalSynthesizer::with_seed(42);
        let mut b = SignalSynthesizer::with_seed(42);
        assert_eq!(a.generate_spectrum(64), b.generate_spectrum(64));
    }
}
