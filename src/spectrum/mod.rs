// src/spectrum/mod.rs
//! Spectrum pipeline: band allocation, transform, aggregation and filtering.

pub mod aggregate;
pub mod band_map;
pub mod fft;
pub mod filters;
pub mod state;

pub use aggregate::{zero_guard, BandAggregator};
pub use band_map::{BandMap, BandMapper};
pub use fft::{SpectrumTransform, WindowFunction};
pub use filters::{FilterChain, FilterMemory, FilterStage};
pub use state::{OutputTarget, SpectrumState};
