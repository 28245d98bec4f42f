// src/spectrum/state.rs
//! Per-output, per-channel pipeline state.

use crate::{
    audio::Channel,
    config::Config,
    error::Result,
    render::Geometry,
};

use super::{
    aggregate::{zero_guard, BandAggregator},
    band_map::{BandMap, BandMapper},
    fft::SpectrumTransform,
    filters::{FilterChain, FilterMemory},
};

/// Everything one channel of one output needs between ticks: its band
/// allocation, a planned transform, filter memory and the last emitted bars.
pub struct SpectrumState {
    map: BandMap,
    transform: SpectrumTransform,
    memory: FilterMemory,
    /// Current sample window, filled by the source
    samples: Vec<f32>,
    /// Bars emitted by the most recent successful tick
    bars: Vec<f32>,
}

impl SpectrumState {
    /// Build state for `bars` bars on a channel `channel_height` units tall.
    pub fn new(config: &Config, bars: usize, channel_height: f32, sample_rate: u32) -> Result<Self> {
        let fft_size = config.audio.fft_size;
        let scale = config
            .bands
            .weight_scale
            .unwrap_or(channel_height.max(1.0) / fft_size as f32 / 4000.0);

        let map = BandMapper {
            bars,
            low_freq: config.bands.low_freq,
            high_freq: config.bands.high_freq,
            sample_rate,
            fft_size,
            exponent: config.bands.weight_exponent,
            scale,
            table: &config.bands.weight_table,
        }
        .compute()?;

        Ok(Self::from_map(
            map,
            SpectrumTransform::new(fft_size, config.audio.window),
        ))
    }

    /// Assemble state from a precomputed band map and transform.
    pub fn from_map(map: BandMap, transform: SpectrumTransform) -> Self {
        let bars = map.bars();
        Self {
            samples: vec![0.0; transform.size()],
            map,
            transform,
            memory: FilterMemory::new(bars),
            bars: vec![0.0; bars],
        }
    }

    /// Sample window the source writes into before [`process`](Self::process).
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Transform the current window, reduce it to bars and filter the result.
    pub fn process(&mut self, aggregator: &BandAggregator, chain: &FilterChain) -> &[f32] {
        let spectrum = self.transform.execute(&self.samples);
        aggregator.reduce(spectrum, &self.map, &mut self.bars);
        zero_guard(&mut self.bars);
        chain.apply(&mut self.bars, self.map.weights(), &mut self.memory);
        &self.bars
    }

    /// Raw band values for the current window, before the zero guard and filters.
    pub fn raw_bands(&mut self, aggregator: &BandAggregator) -> Vec<f32> {
        let spectrum = self.transform.execute(&self.samples);
        let mut raw = vec![0.0; self.map.bars()];
        aggregator.reduce(spectrum, &self.map, &mut raw);
        raw
    }

    /// Bars from the most recent processed tick.
    pub fn bars(&self) -> &[f32] {
        &self.bars
    }

    pub fn band_map(&self) -> &BandMap {
        &self.map
    }

    pub fn memory(&self) -> &FilterMemory {
        &self.memory
    }
}

/// One display region with independent left and right channel state.
pub struct OutputTarget {
    pub geometry: Geometry,
    left: SpectrumState,
    right: SpectrumState,
}

impl OutputTarget {
    /// Derive the bar count from `geometry` and build both channels.
    pub fn new(config: &Config, geometry: Geometry, sample_rate: u32) -> Result<Self> {
        let bars = config.layout.bars_for_width(geometry.width)?;
        let channel_height = f32::from(geometry.height) / 2.0;
        Ok(Self {
            geometry,
            left: SpectrumState::new(config, bars, channel_height, sample_rate)?,
            right: SpectrumState::new(config, bars, channel_height, sample_rate)?,
        })
    }

    pub fn bars(&self) -> usize {
        self.left.band_map().bars()
    }

    pub fn channel(&self, channel: Channel) -> &SpectrumState {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut SpectrumState {
        match channel {
            Channel::Left => &mut self.left,
            Channel::Right => &mut self.right,
        }
    }
}
