//! Sampling-rate control

/// Bounded, stepped sampling-rate value (Hz)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingRate {
    value: u32,
    min: u32,
    max: u32,
    step: u32,
}

impl SamplingRate {
    /// Create a control; `initial` is clamped and snapped like any update
    pub fn new(initial: u32, min: u32, max: u32, step: u32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let mut rate = Self {
            value: min,
            min,
            max,
            step: step.max(1),
        };
        rate.value = rate.constrain(initial as f64);
        rate
    }

    /// Snap `hz` onto the step grid starting at `min`, then clamp
    pub fn constrain(&self, hz: f64) -> u32 {
        if !hz.is_finite() {
            return self.value;
        }
        let steps = ((hz - self.min as f64) / self.step as f64).round();
        let snapped = self.min as f64 + steps * self.step as f64;
        snapped.clamp(self.min as f64, self.max as f64) as u32
    }

    /// Apply a new value. Returns true if the stored value changed.
    pub fn set(&mut self, hz: f64) -> bool {
        let next = self.constrain(hz);
        let changed = next != self.value;
        self.value = next;
        changed
    }

    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Human-readable rate: `"2.5 kHz"` from 1 kHz up, `"500 Hz"` below
pub fn format_rate(hz: u32) -> String {
    if hz >= 1000 {
        format!("{:.1} kHz", hz as f64 / 1000.0)
    } else {
        format!("{} Hz", hz)
    }
}
