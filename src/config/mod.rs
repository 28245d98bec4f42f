// src/config/mod.rs
//! Configuration: TOML file sections plus command-line overrides.
//!
//! Every field has a default so an empty (or absent) file yields a working
//! setup equivalent to the classic 60 fps, 2048-point, 50 Hz - 18 kHz layout.

pub mod cli;

use std::{fs, path::Path, path::PathBuf};

use serde::Deserialize;
use tracing::Level;

use crate::{
    audio::SourceKind,
    error::{BandscopeError, Result},
    render::Geometry,
    spectrum::{FilterStage, WindowFunction},
};

pub use cli::Args;

/// Perceptual weight table applied across the bar range (sampled at `n * len / bars`).
pub const DEFAULT_WEIGHT_TABLE: [f32; 64] = [
    1.0, 1.0, 1.0, 1.0, 0.8, 0.8, 1.0, 0.8, 0.8, 1.0, 1.0, 0.8, 1.0, 1.0, 0.8, 0.6, 0.6, 0.7, 0.8,
    0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8,
    0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.7, 0.6, 0.6, 0.6, 0.6, 0.6, 0.6, 0.6, 0.6, 0.6, 0.6, 0.6,
    0.6, 0.6, 0.6, 0.6, 0.6, 0.6, 0.6,
];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub audio: AudioConfig,
    pub bands: BandConfig,
    pub layout: LayoutConfig,
    pub filters: FilterConfig,
    pub log: LogConfig,
}

/// Sample acquisition and tick timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConfig {
    /// Ticks per second
    pub frame_rate: u32,
    /// FFT window length in frames
    pub fft_size: usize,
    /// Source kinds in the order they are tried at startup
    pub sources: Vec<SourceKind>,
    /// WAV file for the file source
    pub file: Option<PathBuf>,
    /// Raw s16le stereo PCM path for the polled source (`-` reads stdin)
    pub fifo: Option<PathBuf>,
    /// Sample rate of the polled stream
    pub fifo_sample_rate: u32,
    /// Capture ring capacity in stereo frames
    pub ring_frames: usize,
    /// How far the live read position trails the writer, in milliseconds
    pub latency_ms: u32,
    /// Consecutive underrun ticks before the reader re-anchors to the writer
    pub resync_after: u32,
    /// Initialization attempts per live source
    pub retry_attempts: u32,
    /// Delay before the second attempt, doubled on each further attempt
    pub retry_backoff_ms: u64,
    /// Analysis window applied before the transform
    pub window: WindowFunction,
    /// Play the file through the default output device while visualizing
    pub play: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            fft_size: 2048,
            sources: vec![SourceKind::File, SourceKind::Callback, SourceKind::Polled],
            file: None,
            fifo: None,
            fifo_sample_rate: 44100,
            ring_frames: 16384,
            latency_ms: 50,
            resync_after: 8,
            retry_attempts: 3,
            retry_backoff_ms: 100,
            window: WindowFunction::Rectangular,
            play: false,
        }
    }
}

/// Bar frequency allocation and perceptual weighting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BandConfig {
    pub low_freq: f32,
    pub high_freq: f32,
    /// Exponent applied to each bar's center frequency
    pub weight_exponent: f32,
    /// Explicit weight scale; derived from the channel height when unset
    pub weight_scale: Option<f32>,
    pub weight_table: Vec<f32>,
    /// Exponent compressing each averaged band magnitude
    pub compression: f32,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            low_freq: 50.0,
            high_freq: 18000.0,
            weight_exponent: 0.85,
            weight_scale: None,
            weight_table: DEFAULT_WEIGHT_TABLE.to_vec(),
            compression: 0.7,
        }
    }
}

/// Bar geometry on each output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub box_size: u16,
    pub box_margin: u16,
    pub padding: u16,
    pub max_bars: usize,
    /// Fixed output regions; the whole surface is used when empty
    pub outputs: Vec<Geometry>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            box_size: 2,
            box_margin: 1,
            padding: 1,
            max_bars: 200,
            outputs: Vec::new(),
        }
    }
}

impl LayoutConfig {
    /// Number of bars that fit across `width`, capped at `max_bars`.
    pub fn bars_for_width(&self, width: u16) -> Result<usize> {
        let pitch = usize::from(self.box_size) + usize::from(self.box_margin);
        let usable = usize::from(width).saturating_sub(2 * usize::from(self.padding));
        let bars = (usable / pitch).min(self.max_bars);
        if bars == 0 {
            return Err(BandscopeError::Config(format!(
                "output width {width} fits no bars (pitch {pitch}, padding {})",
                self.padding
            )));
        }
        Ok(bars)
    }
}

/// Ordered filter stages applied to every channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub stages: Vec<FilterStage>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            stages: FilterStage::default_chain(),
        }
    }
}

/// Logging destination and verbosity.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,
    /// Write logs here instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

impl LogConfig {
    /// Parse the configured level, falling back to WARN.
    pub fn parse_level(&self) -> Level {
        self.level.parse().unwrap_or(Level::WARN)
    }
}

impl Config {
    /// Load from a TOML file, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| BandscopeError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse configuration text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BandscopeError::Config(e.to_string()))
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        if audio.frame_rate == 0 {
            return Err(config_err("frame_rate must be positive"));
        }
        if audio.fft_size < 16 || audio.fft_size % 2 != 0 {
            return Err(config_err("fft_size must be an even number of at least 16"));
        }
        if audio.sources.is_empty() {
            return Err(config_err("at least one source kind is required"));
        }
        if audio.ring_frames < 2 * audio.fft_size {
            return Err(config_err("ring_frames must hold at least two FFT windows"));
        }
        if audio.latency_ms > 500 {
            return Err(config_err("latency_ms must not exceed 500"));
        }
        if audio.fifo_sample_rate == 0 {
            return Err(config_err("fifo_sample_rate must be positive"));
        }

        let bands = &self.bands;
        if !(bands.low_freq > 0.0) || bands.low_freq >= bands.high_freq {
            return Err(config_err("low_freq must be positive and below high_freq"));
        }
        if bands.weight_table.iter().any(|w| !w.is_finite()) {
            return Err(config_err("weight_table entries must be finite"));
        }
        if !(bands.compression > 0.0) {
            return Err(config_err("compression exponent must be positive"));
        }

        let layout = &self.layout;
        if layout.box_size == 0 {
            return Err(config_err("box_size must be positive"));
        }
        if layout.max_bars == 0 {
            return Err(config_err("max_bars must be positive"));
        }

        for stage in &self.filters.stages {
            stage.validate()?;
        }
        Ok(())
    }
}

fn config_err(msg: &str) -> BandscopeError {
    BandscopeError::Config(msg.to_string())
}
