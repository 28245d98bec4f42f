// src/spectrum/band_map.rs
//! Perceptual bar-to-bin allocation.
//!
//! Center frequencies are spaced geometrically between the low and high
//! cutoffs, converted to quarter-window bin indices, and nudged apart so every
//! bar owns at least one bin. Each bar also gets a weight that lifts the
//! naturally quieter high end.

use crate::error::{BandscopeError, Result};

/// Inputs for one band allocation.
#[derive(Debug, Clone, Copy)]
pub struct BandMapper<'a> {
    pub bars: usize,
    pub low_freq: f32,
    pub high_freq: f32,
    pub sample_rate: u32,
    pub fft_size: usize,
    /// Exponent applied to each center frequency
    pub exponent: f32,
    /// Flat multiplier folded into every weight
    pub scale: f32,
    /// Perceptual table, sampled at `n * len / bars`; empty means all ones
    pub table: &'a [f32],
}

/// Per-bar bin ranges and weights produced by [`BandMapper::compute`].
#[derive(Debug, Clone, PartialEq)]
pub struct BandMap {
    low_bin: Vec<usize>,
    high_bin: Vec<usize>,
    center_freq: Vec<f32>,
    weight: Vec<f32>,
}

impl BandMapper<'_> {
    /// Compute bin ranges and weights for every bar.
    pub fn compute(&self) -> Result<BandMap> {
        let bars = self.bars;
        if bars == 0 {
            return Err(BandscopeError::Config("bar count must be positive".into()));
        }
        if !(self.low_freq > 0.0) || self.low_freq >= self.high_freq {
            return Err(BandscopeError::Config(format!(
                "low frequency {} must be positive and below high frequency {}",
                self.low_freq, self.high_freq
            )));
        }
        if self.sample_rate < 2 {
            return Err(BandscopeError::Config("sample rate too low".into()));
        }

        let bars_plus = bars as f64 + 1.0;
        let freqconst =
            (f64::from(self.low_freq) / f64::from(self.high_freq)).log10() / (1.0 / bars_plus - 1.0);
        let nyquist = (self.sample_rate / 2) as f32;
        let quarter = (self.fft_size / 4) as f32;

        let mut center_freq = vec![0.0f32; bars + 1];
        let mut low_bin = vec![0usize; bars + 1];
        let mut high_bin = vec![0usize; bars];

        for n in 0..=bars {
            let exp = -freqconst + ((n as f64 + 1.0) / bars_plus) * freqconst;
            center_freq[n] = (f64::from(self.high_freq) * 10f64.powf(exp)) as f32;
            let rel_freq = center_freq[n] / nyquist;
            low_bin[n] = (rel_freq * quarter) as usize;
            if n > 0 {
                if low_bin[n] <= low_bin[n - 1] {
                    low_bin[n] = low_bin[n - 1] + 1;
                }
                high_bin[n - 1] = low_bin[n] - 1;
            }
        }

        let spectrum_top = self.fft_size / 2;
        if high_bin[bars - 1] > spectrum_top {
            return Err(BandscopeError::Config(format!(
                "{bars} bars need bin {} but the spectrum ends at {spectrum_top}",
                high_bin[bars - 1]
            )));
        }

        let weight = (0..bars)
            .map(|n| {
                let table_weight = if self.table.is_empty() {
                    1.0
                } else {
                    self.table[n * self.table.len() / bars]
                };
                center_freq[n].powf(self.exponent) * self.scale * table_weight
            })
            .collect();

        low_bin.truncate(bars);
        center_freq.truncate(bars);

        Ok(BandMap {
            low_bin,
            high_bin,
            center_freq,
            weight,
        })
    }
}

impl BandMap {
    /// Number of bars covered.
    pub fn bars(&self) -> usize {
        self.weight.len()
    }

    /// First bin of each bar.
    pub fn low_bins(&self) -> &[usize] {
        &self.low_bin
    }

    /// Last bin (inclusive) of each bar.
    pub fn high_bins(&self) -> &[usize] {
        &self.high_bin
    }

    /// Center frequency of each bar in Hz.
    pub fn center_freqs(&self) -> &[f32] {
        &self.center_freq
    }

    /// Perceptual multiplier for each bar.
    pub fn weights(&self) -> &[f32] {
        &self.weight
    }

    /// Inclusive bin range of bar `i`.
    pub fn range(&self, i: usize) -> std::ops::RangeInclusive<usize> {
        self.low_bin[i]..=self.high_bin[i]
    }

    /// Bar whose range contains `bin`, if any.
    pub fn bar_for_bin(&self, bin: usize) -> Option<usize> {
        (0..self.bars()).find(|&i| self.range(i).contains(&bin))
    }
}
