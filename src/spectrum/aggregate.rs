// src/spectrum/aggregate.rs
//! Reduction of a complex spectrum into one raw value per bar.

use rustfft::num_complex::Complex;

use super::band_map::BandMap;

/// Averages bin magnitudes over each bar's range and compresses the result.
#[derive(Debug, Clone, Copy)]
pub struct BandAggregator {
    /// Exponent applied to each averaged magnitude
    pub compression: f32,
}

impl Default for BandAggregator {
    fn default() -> Self {
        Self { compression: 0.7 }
    }
}

impl BandAggregator {
    pub fn new(compression: f32) -> Self {
        Self { compression }
    }

    /// Write one compressed band magnitude per bar into `out`.
    ///
    /// Bins outside `spectrum` count as silence.
    pub fn reduce(&self, spectrum: &[Complex<f32>], map: &BandMap, out: &mut [f32]) {
        for (i, value) in out.iter_mut().enumerate().take(map.bars()) {
            let range = map.range(i);
            let width = (range.end() - range.start() + 1) as f32;
            let sum: f32 = range
                .filter_map(|b| spectrum.get(b))
                .map(|c| (c.re * c.re + c.im * c.im).sqrt())
                .sum();
            *value = (sum / width).powf(self.compression);
        }
    }
}

/// Replace exact zeros with 1.0 so later stages never divide by zero.
pub fn zero_guard(bars: &mut [f32]) {
    for value in bars.iter_mut() {
        if *value == 0.0 {
            *value = 1.0;
        }
    }
}
