//! Headless render target

use super::pipeline::{Frame, Surface, Viewport};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Presented {
    viewport: Viewport,
    count: u64,
    last: Option<Frame>,
}

/// Surface that keeps the most recent frame in memory.
///
/// Clones share state, so a caller can hand one clone to a session and
/// inspect what it presented through another.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    inner: Arc<Mutex<Presented>>,
}

impl MemorySurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Presented {
                viewport,
                count: 0,
                last: None,
            })),
        }
    }

    /// Number of frames presented so far
    pub fn presented(&self) -> u64 {
        self.inner.lock().map(|p| p.count).unwrap_or_default()
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.inner.lock().ok().and_then(|p| p.last.clone())
    }

    pub fn resize(&self, viewport: Viewport) {
        if let Ok(mut p) = self.inner.lock() {
            p.viewport = viewport;
        }
    }
}

impl Surface for MemorySurface {
    fn viewport(&self) -> Viewport {
        self.inner
            .lock()
            .map(|p| p.viewport)
            .unwrap_or(Viewport::new(0.0, 0.0))
    }

    fn present(&mut self, frame: Frame) {
        if let Ok(mut p) = self.inner.lock() {
            p.count += 1;
            p.last = Some(frame);
        }
    }
}
