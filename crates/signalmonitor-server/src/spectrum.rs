//! Magnitude spectrum of a synthesized oscillogram

use rustfft::{num_complex::Complex, FftPlanner};

/// Computes normalised magnitude spectra
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f32>,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Magnitudes of the first `bins` frequency bins of `samples`, scaled so
    /// the strongest bin is 1.0. The DC bin is zeroed.
    ///
    /// `samples` shorter than `2 × bins` are zero-padded.
    pub fn magnitudes(&mut self, samples: &[f32], bins: usize) -> Vec<f32> {
        if bins == 0 {
            return Vec::new();
        }
        let fft_size = (bins * 2).max(samples.len());

        let mut buffer: Vec<Complex<f32>> = samples
            .iter()
            .map(|&x| Complex::new(x, 0.0))
            .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
            .take(fft_size)
            .collect();

        let fft = self.planner.plan_fft_forward(fft_size);
        fft.process(&mut buffer);

        let mut magnitudes: Vec<f32> = buffer.iter().take(bins).map(|c| c.norm()).collect();
        magnitudes[0] = 0.0;

        let peak = magnitudes.iter().cloned().fold(0.0f32, f32::max);
        if peak > 0.0 && peak.is_finite() {
            for m in &mut magnitudes {
                *m /= peak;
            }
        }
        magnitudes
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn test_pure_tone_peak() {
        let n = 256;
        // Exactly 16 cycles across the window
        let samples: Vec<f32> = (0..n).map(|i| (TAU * 16.0 * i as f32 / n as f32).sin()).collect();

        let spectrum = SpectrumAnalyzer::new().magnitudes(&samples, n / 2);
        assert_eq!(spectrum.len(), 128);

        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 16);
        assert!((spectrum[16] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_values_normalised() {
        let samples: Vec<f32> = (0..100).map(|i| ((i * 7) % 13) as f32 / 13.0 - 0.5).collect();
        let spectrum = SpectrumAnalyzer::new().magnitudes(&samples, 64);

        assert_eq!(spectrum.len(), 64);
        assert!(spectrum.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_silence_and_zero_bins() {
        let mut analyzer = SpectrumAnalyzer::new();
        assert!(analyzer.magnitudes(&[0.5; 16], 0).is_empty());
        assert!(analyzer.magnitudes(&[0.0; 32], 16).iter().all(|&v| v == 0.0));
    }
}
