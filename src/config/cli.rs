// src/config/cli.rs
//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use super::Config;
use crate::{audio::SourceKind, spectrum::FilterStage};

/// Command line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "bandscope")]
#[command(about = "Live bar spectrum of a WAV file, capture device or PCM stream", long_about = None)]
pub struct Args {
    /// 16-bit stereo WAV file to visualize
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Source kinds to try, in order (repeatable)
    #[arg(long = "source", value_enum, value_name = "KIND")]
    pub sources: Vec<SourceKind>,

    /// Raw s16le stereo PCM stream for the polled source (`-` for stdin)
    #[arg(long, value_name = "PATH")]
    pub fifo: Option<PathBuf>,

    /// How far the live display trails the capture, in milliseconds
    #[arg(long, value_name = "MS")]
    pub latency: Option<u32>,

    /// Ticks per second
    #[arg(long, value_name = "FPS")]
    pub frame_rate: Option<u32>,

    /// FFT window length
    #[arg(long, value_name = "N")]
    pub fft_size: Option<usize>,

    /// Lowest displayed frequency in Hz
    #[arg(long, value_name = "HZ")]
    pub low_freq: Option<f32>,

    /// Highest displayed frequency in Hz
    #[arg(long, value_name = "HZ")]
    pub high_freq: Option<f32>,

    /// Upper bound on bars per channel
    #[arg(long, value_name = "N")]
    pub bars_max: Option<usize>,

    /// Append a gravity stage with this constant
    #[arg(long, value_name = "G")]
    pub gravity: Option<f32>,

    /// Play the file while visualizing it
    #[arg(long)]
    pub play: bool,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Overlay command-line values onto a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(file) = &self.file {
            config.audio.file = Some(file.clone());
        }
        if !self.sources.is_empty() {
            config.audio.sources = self.sources.clone();
        }
        if let Some(fifo) = &self.fifo {
            config.audio.fifo = Some(fifo.clone());
        }
        if let Some(latency) = self.latency {
            config.audio.latency_ms = latency;
        }
        if let Some(rate) = self.frame_rate {
            config.audio.frame_rate = rate;
        }
        if let Some(size) = self.fft_size {
            config.audio.fft_size = size;
        }
        if let Some(low) = self.low_freq {
            config.bands.low_freq = low;
        }
        if let Some(high) = self.high_freq {
            config.bands.high_freq = high;
        }
        if let Some(max) = self.bars_max {
            config.layout.max_bars = max;
        }
        if let Some(constant) = self.gravity {
            config
                .filters
                .stages
                .retain(|stage| !matches!(stage, FilterStage::Gravity { .. }));
            config.filters.stages.push(FilterStage::gravity(constant));
        }
        if self.play {
            config.audio.play = true;
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if let Some(path) = &self.log_file {
            config.log.file = Some(path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_applied() {
        let args = Args::parse_from([
            "bandscope",
            "song.wav",
            "--source",
            "polled",
            "--source",
            "file",
            "--frame-rate",
            "120",
            "--gravity",
            "2.0",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.audio.file, Some(PathBuf::from("song.wav")));
        assert_eq!(
            config.audio.sources,
            vec![SourceKind::Polled, SourceKind::File]
        );
        assert_eq!(config.audio.frame_rate, 120);
        assert!(matches!(
            config.filters.stages.last(),
            Some(FilterStage::Gravity { constant, .. }) if *constant == 2.0
        ));
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::parse_from(["bandscope"]);
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.audio.frame_rate, 60);
        assert!(config.audio.file.is_none());
        assert!(!config.audio.play);
    }
}
