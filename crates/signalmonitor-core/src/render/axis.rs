//! Axis labels for the plot area

use crate::acquisition::controller::AcquisitionMode;

/// Labels under the plot: left end, axis title, right end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisLabels {
    pub start: String,
    pub title: String,
    pub end: String,
}

/// Labels for `mode` at sampling rate `rate` (Hz).
///
/// The spectrum axis spans 0 to Nyquist; the time axis spans 100 samples.
pub fn axis_labels(mode: AcquisitionMode, rate: u32) -> AxisLabels {
    let rate = rate.max(1) as f64;
    match mode {
        AcquisitionMode::Fft => AxisLabels {
            start: "0 Hz".to_string(),
            title: "Frequency →".to_string(),
            end: format!("{} Hz", rate / 2.0),
        },
        AcquisitionMode::Osc | AcquisitionMode::Idle => AxisLabels {
            start: "0 ms".to_string(),
            title: "Time →".to_string(),
            end: format!("{:.0} ms", 1000.0 / rate * 100.0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_axis_ends_at_nyquist() {
        let labels = axis_labels(AcquisitionMode::Fft, 5000);
        assert_eq!(labels.start, "0 Hz");
        assert_eq!(labels.end, "2500 Hz");
    }

    #[test]
    fn test_time_axis_spans_hundred_samples() {
        let labels = axis_labels(AcquisitionMode::Osc, 1000);
        assert_eq!(labels.title, "Time →");
        assert_eq!(labels.end, "100 ms");

        assert_eq!(axis_labels(AcquisitionMode::Idle, 3000).end, "33 ms");
    }
}
