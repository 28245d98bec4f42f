// src/render/mod.rs
//! Render module - the contract between the scheduler and whatever draws bars.

pub mod terminal;

pub use terminal::{BarLayout, SpectrumWidget, TerminalRenderer};

use serde::Deserialize;

use crate::{audio::Channel, error::Result};

/// A rectangular display region in renderer cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Geometry {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Geometry {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Out-of-band events a renderer reports between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererSignal {
    None,
    /// The user asked to quit
    Quit,
    /// Output geometry changed; bar counts must be recomputed
    Resized,
}

/// Draws processed bars. One frame is `begin_frame`, a `draw` per output and
/// channel, then `present`.
pub trait Renderer {
    /// Current output regions, one per independently visualized target.
    fn outputs(&mut self) -> Result<Vec<Geometry>>;

    fn begin_frame(&mut self) -> Result<()>;

    /// Stage `bars` for one channel of output `output`.
    fn draw(&mut self, output: usize, geometry: &Geometry, channel: Channel, bars: &[f32])
        -> Result<()>;

    fn present(&mut self) -> Result<()>;

    /// Drain pending input or resize events without blocking.
    fn poll(&mut self) -> Result<RendererSignal>;

    /// Release the display. Called once when the scheduler stops.
    fn finish(&mut self) -> Result<()>;
}
