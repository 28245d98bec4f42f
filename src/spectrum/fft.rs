// src/spectrum/fft.rs
//! FFT computation over one sample window.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Deserialize;

/// Analysis window applied to samples before the transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFunction {
    /// Samples are transformed as-is
    #[default]
    Rectangular,
    /// Hann window to reduce spectral leakage
    Hann,
}

/// Real-input FFT with a fixed window length and pre-planned buffers.
pub struct SpectrumTransform {
    /// Planned forward transform, reused every tick
    fft: Arc<dyn Fft<f32>>,
    /// In-place transform buffer
    buffer: Vec<Complex<f32>>,
    /// Scratch space required by the planned algorithm
    scratch: Vec<Complex<f32>>,
    /// Per-sample window coefficients
    window: Vec<f32>,
}

impl SpectrumTransform {
    /// Plan a transform of `size` points.
    pub fn new(size: usize, window: WindowFunction) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch_len = fft.get_inplace_scratch_len();

        let window = match window {
            WindowFunction::Rectangular => vec![1.0; size],
            WindowFunction::Hann => (0..size)
                .map(|i| {
                    0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())
                })
                .collect(),
        };

        Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            window,
        }
    }

    /// Window length in samples.
    pub fn size(&self) -> usize {
        self.window.len()
    }

    /// Number of complex bins returned by [`execute`](Self::execute).
    pub fn output_len(&self) -> usize {
        self.size() / 2 + 1
    }

    /// Transform `samples` and return the non-redundant half of the spectrum
    /// (`size / 2 + 1` bins). Missing samples are treated as silence.
    pub fn execute(&mut self, samples: &[f32]) -> &[Complex<f32>] {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let len = self.output_len();
        &self.buffer[..len]
    }
}
