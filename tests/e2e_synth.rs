//! E2E tests for the signal synthesizer
//!
//! Verifies shape, bounds, and phase behaviour of the synthesized
//! oscillogram and spectrum over many consecutive calls.

use signalmonitor::SignalSynthesizer;
use std::f32::consts::TAU;

/// Oscillogram amplitude bound: two tones (1.0 + 0.5) plus ±0.05 noise
const OSC_BOUND: f32 = 1.5 + 0.05;

#[test]
fn test_oscillogram_length_and_bounds() {
    let mut synth = SignalSynthesizer::with_seed(1);
    for n in [0usize, 1, 2, 768, 1000] {
        let trace = synth.generate_oscillogram(n);
        assert_eq!(trace.len(), n);
        assert!(trace.iter().all(|v| v.is_finite() && v.abs() <= OSC_BOUND));
    }
}

#[test]
fn test_oscillogram_phase_advances_modulo_tau() {
    let mut synth = SignalSynthesizer::with_seed(2);
    let mut previous = synth.osc_phase();
    for _ in 0..100 {
        synth.generate_oscillogram(768);
        let phase = synth.osc_phase();
        assert!((0.0..TAU).contains(&phase));
        assert_ne!(phase, previous);
        previous = phase;
    }
}

#[test]
fn test_spectrum_bounds_over_many_frames() {
    // The 1.5 kHz line centres one past the last bin; only its lower tail shows
    let peaks = SignalSynthesizer::peak_bins(384);
    assert_eq!(peaks, vec![128, 256]);
    let regions = SignalSynthesizer::peak_regions(384);
    assert_eq!(regions.len(), 3);

    for seed in [3u64, 6] {
        let mut synth = SignalSynthesizer::with_seed(seed);
        for _ in 0..500 {
            let spectrum = synth.generate_spectrum(384);
            assert_eq!(spectrum.len(), 384);
            assert!(spectrum.iter().all(|v| v.is_finite()));
            // Strongest line is 1.0; noise scales by at most 1.2 and ripple adds 0.15
            assert!(spectrum.iter().all(|&v| v <= 1.0 * 1.4));
            for region in &regions {
                for bin in region.clone() {
                    assert!(
                        spectrum[bin] >= 0.0,
                        "peak region bin {} went negative: {}",
                        bin,
                        spectrum[bin]
                    );
                }
            }
        }
    }
}

#[test]
fn test_spectrum_fundamental_dominates() {
    let mut synth = SignalSynthesizer::with_seed(4);
    let peaks = SignalSynthesizer::peak_bins(384);
    let spectrum = synth.generate_spectrum(384);

    // Fundamental ≥ 0.8 - 0.15; bins away from any line carry only the ripple
    assert!(spectrum[peaks[0]] >= 0.64);
    assert!(spectrum[50].abs() <= 0.15 + 1e-6);
    assert!(spectrum[peaks[0]] > spectrum[50]);
}

#[test]
fn test_seeded_synthesizers_agree() {
    let mut a = SignalSynthesizer::with_seed(99);
    let mut b = SignalSynthesizer::with_seed(99);
    for _ in 0..5 {
        assert_eq!(a.generate_oscillogram(256), b.generate_oscillogram(256));
        assert_eq!(a.generate_spectrum(128), b.generate_spectrum(128));
    }
}

#[test]
fn test_reset_restarts_phase() {
    let mut synth = SignalSynthesizer::with_seed(5);
    synth.generate_oscillogram(500);
    synth.generate_spectrum(64);
    synth.reset();
    assert_eq!(synth.osc_phase(), 0.0);
    assert_eq!(synth.fft_phase(), 0.0);
}
