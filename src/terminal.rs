//! Console render target
//!
//! Reduces each presented frame to a one-line summary the status loop can
//! print. Drawing commands are not rasterised.

use signalmonitor::render::pipeline::{Frame, Surface, Viewport};
use signalmonitor::AcquisitionMode;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct TerminalSurface {
    viewport: Viewport,
    summary: Arc<Mutex<String>>,
}

impl TerminalSurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            summary: Arc::new(Mutex::new(String::from("grid"))),
        }
    }

    /// Summary of the most recent frame
    pub fn summary(&self) -> String {
        self.summary
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

fn summarize(frame: &Frame) -> String {
    match frame.mode {
        AcquisitionMode::Osc => match frame.trace() {
            Some(points) => {
                let (lo, hi) = points
                    .iter()
                    .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
                let span = (hi - lo) / frame.viewport.height.max(1.0);
                format!("trace {:>4} pts, span {:>4.0}%", points.len(), span * 100.0)
            }
            None => "trace --".to_string(),
        },
        AcquisitionMode::Fft => {
            let bars = frame.bars();
            match bars
                .iter()
                .enumerate()
                .max_by(|a, b| a.1 .3.total_cmp(&b.1 .3))
            {
                Some((i, _)) => format!("bars {:>4}, tallest #{:<4}", bars.len(), i),
                None => "bars --".to_string(),
            }
        }
        AcquisitionMode::Idle => "grid".to_string(),
    }
}

impl Surface for TerminalSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn present(&mut self, frame: Frame) {
        if let Ok(mut summary) = self.summary.lock() {
            *summary = summarize(&frame);
        }
    }
}
