//! Sample buffer → drawing commands
//!
//! Rendering is a pure mapping of (mode, buffer, viewport) onto a list of
//! primitives in surface pixels, origin top-left. The only state kept
//! between frames is the phase of the no-data sweep cursor.

use crate::acquisition::controller::{AcquisitionMode, SampleBuffer};

/// Spacing of background grid lines (px)
const GRID_SPACING: f32 = 50.0;

/// Oscillogram amplitude 1.0 maps to this fraction of the height
const OSC_AMPLITUDE_RATIO: f32 = 0.35;

/// Spectrum magnitude 1.0 maps to this fraction of the height
const BAR_HEIGHT_RATIO: f32 = 0.85;

/// Fraction of each bar slot that is filled; the rest is gap
const BAR_FILL_RATIO: f32 = 0.8;

/// Narrowest bar slot (px); limits the bar count to width / 4
const MIN_BAR_PITCH: f32 = 4.0;

/// Sweep cursor advance per no-data frame, as a fraction of the width
const SWEEP_STEP: f32 = 0.02;

/// Largest surface dimension (px) a frame is laid out for
pub const MAX_DIMENSION: f32 = 16_384.0;

/// Drawable area in surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Non-finite or negative dimensions collapse to zero; oversized ones
    /// are capped at [`MAX_DIMENSION`]
    fn sanitized(self) -> Self {
        let fix = |v: f32| {
            if v.is_finite() && v > 0.0 {
                v.min(MAX_DIMENSION)
            } else {
                0.0
            }
        };
        Self {
            width: fix(self.width),
            height: fix(self.height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Line styles; colors belong to the surface's theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    /// Thin background grid
    Grid,
    /// Brighter center lines
    Crosshair,
    /// No-data sweep cursor
    Cursor,
    /// Oscillogram trace
    Trace,
}

/// Theme color slots used by gradients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRole {
    Primary,
    Accent,
}

/// One drawing primitive
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Fill the whole viewport with the background
    Clear,
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    /// Connected line through consecutive points
    Polyline { points: Vec<Point>, stroke: Stroke },
    /// Rectangle filled with a vertical gradient from `base` (bottom) to `tip`
    Bar {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        base: ColorRole,
        tip: ColorRole,
    },
}

/// Everything drawn for one render pass
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub viewport: Viewport,
    pub mode: AcquisitionMode,
    pub commands: Vec<DrawCommand>,
}

impl Frame {
    /// Points of the oscillogram trace, if one was drawn
    pub fn trace(&self) -> Option<&[Point]> {
        self.commands.iter().find_map(|c| match c {
            DrawCommand::Polyline {
                points,
                stroke: Stroke::Trace,
            } => Some(points.as_slice()),
            _ => None,
        })
    }

    /// Spectrum bars as (x, y, width, height)
    pub fn bars(&self) -> Vec<(f32, f32, f32, f32)> {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                DrawCommand::Bar {
                    x,
                    y,
                    width,
                    height,
                    ..
                } => Some((x, y, width, height)),
                _ => None,
            })
            .collect()
    }

    /// True if the frame carries sample data beyond the grid
    pub fn has_data(&self) -> bool {
        self.commands.iter().any(|c| {
            matches!(
                c,
                DrawCommand::Bar { .. }
                    | DrawCommand::Polyline {
                        stroke: Stroke::Trace,
                        ..
                    }
            )
        })
    }
}

/// Destination of rendered frames
pub trait Surface: Send {
    /// Current drawable size
    fn viewport(&self) -> Viewport;

    /// Draw a finished frame
    fn present(&mut self, frame: Frame);
}

/// Maps sample buffers onto drawing commands
#[derive(Debug, Clone, Default)]
pub struct RenderPipeline {
    /// Sweep cursor position in [0, 1)
    sweep_phase: f32,
}

impl RenderPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one frame.
    ///
    /// The grid is always drawn first. A buffer produced for a different mode
    /// than `mode` is never drawn. Empty or single-sample buffers leave only
    /// the grid (plus the sweep cursor while acquiring).
    pub fn render(
        &mut self,
        mode: AcquisitionMode,
        buffer: Option<&SampleBuffer>,
        viewport: Viewport,
    ) -> Frame {
        let viewport = viewport.sanitized();
        let mut commands = vec![DrawCommand::Clear];
        draw_grid(&mut commands, viewport);

        let buffer = buffer.filter(|b| b.mode() == mode);
        let drawn = match (mode, buffer) {
            (AcquisitionMode::Osc, Some(b)) => draw_oscillogram(&mut commands, viewport, b.samples()),
            (AcquisitionMode::Fft, Some(b)) => draw_spectrum(&mut commands, viewport, b.samples()),
            _ => false,
        };

        if !drawn && mode != AcquisitionMode::Idle {
            let x = self.sweep_phase * viewport.width;
            commands.push(DrawCommand::Line {
                from: Point { x, y: 0.0 },
                to: Point {
                    x,
                    y: viewport.height,
                },
                stroke: Stroke::Cursor,
            });
            self.sweep_phase = (self.sweep_phase + SWEEP_STEP).fract();
        }

        Frame {
            viewport,
            mode,
            commands,
        }
    }

    /// Grid-only frame for the idle view
    pub fn render_idle(&mut self, viewport: Viewport) -> Frame {
        self.render(AcquisitionMode::Idle, None, viewport)
    }
}

/// Number of grid spacings that fit in `extent` (lines at 0, 50, ... ≤ extent)
fn grid_steps(extent: f32) -> u32 {
    (extent / GRID_SPACING).floor() as u32
}

fn draw_grid(commands: &mut Vec<DrawCommand>, viewport: Viewport) {
    let Viewport { width, height } = viewport;

    for i in 0..=grid_steps(width) {
        let x = i as f32 * GRID_SPACING;
        commands.push(DrawCommand::Line {
            from: Point { x, y: 0.0 },
            to: Point { x, y: height },
            stroke: Stroke::Grid,
        });
    }

    for i in 0..=grid_steps(height) {
        let y = i as f32 * GRID_SPACING;
        commands.push(DrawCommand::Line {
            from: Point { x: 0.0, y },
            to: Point { x: width, y },
            stroke: Stroke::Grid,
        });
    }

    commands.push(DrawCommand::Line {
        from: Point {
            x: 0.0,
            y: height / 2.0,
        },
        to: Point {
            x: width,
            y: height / 2.0,
        },
        stroke: Stroke::Crosshair,
    });
    commands.push(DrawCommand::Line {
        from: Point {
            x: width / 2.0,
            y: 0.0,
        },
        to: Point {
            x: width / 2.0,
            y: height,
        },
        stroke: Stroke::Crosshair,
    });
}

/// Index maps linearly across the width, value maps around the center line.
/// Buffers wider than the viewport are decimated to about one point per pixel.
fn draw_oscillogram(commands: &mut Vec<DrawCommand>, viewport: Viewport, samples: &[f32]) -> bool {
    let n = samples.len();
    if n < 2 {
        return false;
    }

    let center_y = viewport.height / 2.0;
    let amplitude = viewport.height * OSC_AMPLITUDE_RATIO;
    let x_step = viewport.width / n as f32;
    let max_points = (viewport.width.ceil() as usize).max(2);
    let stride = n.div_ceil(max_points).max(1);

    let points: Vec<Point> = samples
        .iter()
        .enumerate()
        .step_by(stride)
        .map(|(i, &v)| {
            let v = if v.is_finite() { v } else { 0.0 };
            Point {
                x: i as f32 * x_step,
                y: center_y + v * amplitude,
            }
        })
        .collect();

    if points.len() < 2 {
        return false;
    }
    commands.push(DrawCommand::Polyline {
        points,
        stroke: Stroke::Trace,
    });
    true
}

/// One bar per bin, at most one per 4 px; surplus bins are truncated
fn draw_spectrum(commands: &mut Vec<DrawCommand>, viewport: Viewport, bins: &[f32]) -> bool {
    let bar_count = bins
        .len()
        .min((viewport.width / MIN_BAR_PITCH).floor() as usize);
    if bar_count == 0 {
        return false;
    }

    let pitch = viewport.width / bar_count as f32;
    let bar_width = pitch * BAR_FILL_RATIO;

    for (i, &value) in bins.iter().take(bar_count).enumerate() {
        let magnitude = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let bar_height = magnitude * viewport.height * BAR_HEIGHT_RATIO;
        commands.push(DrawCommand::Bar {
            x: i as f32 * pitch,
            y: viewport.height - bar_height,
            width: bar_width,
            height: bar_height,
            base: ColorRole::Primary,
            tip: ColorRole::Accent,
        });
    }
    true
}
