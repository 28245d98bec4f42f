// src/lib.rs
//! Bandscope - a live bar spectrum visualizer.
//!
//! This library provides the audio-to-bar pipeline: sample sources, band
//! allocation, the spectrum transform, the filter chain and the tick scheduler
//! that feeds a renderer.

pub mod audio;
pub mod config;
pub mod error;
pub mod logging;
pub mod render;
pub mod scheduler;
pub mod signals;
pub mod spectrum;

pub use error::{BandscopeError, Result};
