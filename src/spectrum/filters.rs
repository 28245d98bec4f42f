// src/spectrum/filters.rs
//! Ordered filter stages that turn raw band values into displayed heights.
//!
//! The stage list is data: each [`FilterStage`] carries its own parameters and
//! [`FilterChain::apply`] runs them in order. Cross-tick state lives in a
//! [`FilterMemory`] owned by each channel, never in the chain itself.

use serde::Deserialize;

use crate::error::{BandscopeError, Result};

/// Floor applied to every bar before spreading.
const MONSTERCAT_FLOOR: f32 = 0.125;

/// One transform in the filter chain.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterStage {
    /// Multiply each bar by its perceptual weight.
    FrequencyWeight,
    /// Centered moving average repeated `passes` times.
    Smooth {
        #[serde(default = "default_smooth_passes")]
        passes: usize,
        /// Window width, odd
        #[serde(default = "default_smooth_points")]
        points: usize,
    },
    /// Polynomial fade of the first `head` and last `tail` bars.
    MarginTaper {
        #[serde(default = "default_head_margin")]
        head: usize,
        #[serde(default)]
        tail: usize,
        #[serde(default = "default_margin_decay")]
        decay: f32,
        #[serde(default = "default_min_weight")]
        min_weight: f32,
    },
    /// Raise each bar toward its neighbors with exponential distance falloff.
    Monstercat {
        #[serde(default = "default_monstercat_factor")]
        factor: f32,
    },
    /// Exponential memory: `memory = memory * decay + bar`.
    Integral {
        #[serde(default = "default_integral_decay")]
        decay: f32,
    },
    /// Peak hold with accelerating fall, normalized to the tick rate.
    Gravity {
        #[serde(default = "default_gravity_constant")]
        constant: f32,
        #[serde(default = "default_reference_rate")]
        reference_rate: f32,
        #[serde(default = "default_gravity_exponent")]
        exponent: f32,
        #[serde(default = "default_fall_step")]
        fall_step: f32,
    },
}

fn default_smooth_passes() -> usize {
    4
}
fn default_smooth_points() -> usize {
    3
}
fn default_head_margin() -> usize {
    7
}
fn default_margin_decay() -> f32 {
    1.6
}
fn default_min_weight() -> f32 {
    0.6
}
fn default_monstercat_factor() -> f32 {
    1.5
}
fn default_integral_decay() -> f32 {
    0.6
}
fn default_gravity_constant() -> f32 {
    1.0
}
fn default_reference_rate() -> f32 {
    60.0
}
fn default_gravity_exponent() -> f32 {
    2.5
}
fn default_fall_step() -> f32 {
    0.028
}

impl FilterStage {
    /// Weight, smooth, taper, spread, integrate.
    pub fn default_chain() -> Vec<Self> {
        vec![
            Self::FrequencyWeight,
            Self::Smooth {
                passes: default_smooth_passes(),
                points: default_smooth_points(),
            },
            Self::MarginTaper {
                head: default_head_margin(),
                tail: 0,
                decay: default_margin_decay(),
                min_weight: default_min_weight(),
            },
            Self::Monstercat {
                factor: default_monstercat_factor(),
            },
            Self::Integral {
                decay: default_integral_decay(),
            },
        ]
    }

    /// Gravity stage with default reference rate, exponent and step.
    pub fn gravity(constant: f32) -> Self {
        Self::Gravity {
            constant,
            reference_rate: default_reference_rate(),
            exponent: default_gravity_exponent(),
            fall_step: default_fall_step(),
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FrequencyWeight => "frequency_weight",
            Self::Smooth { .. } => "smooth",
            Self::MarginTaper { .. } => "margin_taper",
            Self::Monstercat { .. } => "monstercat",
            Self::Integral { .. } => "integral",
            Self::Gravity { .. } => "gravity",
        }
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            Self::FrequencyWeight => true,
            Self::Smooth { points, .. } => points % 2 == 1,
            Self::MarginTaper {
                decay, min_weight, ..
            } => decay > 0.0 && (0.0..=1.0).contains(&min_weight),
            Self::Monstercat { factor } => factor.is_finite() && factor >= 1.0,
            Self::Integral { decay } => decay > 0.0 && decay < 1.0,
            Self::Gravity {
                constant,
                reference_rate,
                exponent,
                fall_step,
            } => {
                constant >= 0.0 && reference_rate > 0.0 && exponent.is_finite() && fall_step >= 0.0
            }
        };
        if ok {
            Ok(())
        } else {
            Err(BandscopeError::Config(format!(
                "invalid parameters for {} stage: {self:?}",
                self.name()
            )))
        }
    }
}

/// Per-channel filter state carried across ticks.
#[derive(Debug, Clone)]
pub struct FilterMemory {
    /// Integral filter accumulator
    pub integral: Vec<f32>,
    /// Value emitted by the gravity stage last tick
    pub last: Vec<f32>,
    /// Gravity fall counter
    pub fall: Vec<f32>,
    /// Gravity peak hold
    pub peak: Vec<f32>,
    scratch: Vec<f32>,
}

impl FilterMemory {
    pub fn new(bars: usize) -> Self {
        Self {
            integral: vec![0.0; bars],
            last: vec![0.0; bars],
            fall: vec![0.0; bars],
            peak: vec![0.0; bars],
            scratch: Vec::with_capacity(bars),
        }
    }
}

/// Ordered stage list plus the tick rate the gravity stage normalizes against.
#[derive(Debug, Clone)]
pub struct FilterChain {
    stages: Vec<FilterStage>,
    frame_rate: f32,
}

impl FilterChain {
    pub fn new(stages: Vec<FilterStage>, frame_rate: u32) -> Self {
        Self {
            stages,
            frame_rate: frame_rate.max(1) as f32,
        }
    }

    /// Chain with no stages: raw values pass through.
    pub fn passthrough() -> Self {
        Self::new(Vec::new(), 60)
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Run every stage over `bars` in order.
    pub fn apply(&self, bars: &mut [f32], weights: &[f32], memory: &mut FilterMemory) {
        for stage in &self.stages {
            match *stage {
                FilterStage::FrequencyWeight => frequency_weight(bars, weights),
                FilterStage::Smooth { passes, points } => {
                    spatial_smooth(bars, &mut memory.scratch, passes, points)
                }
                FilterStage::MarginTaper {
                    head,
                    tail,
                    decay,
                    min_weight,
                } => margin_taper(bars, head, tail, decay, min_weight),
                FilterStage::Monstercat { factor } => monstercat(bars, factor),
                FilterStage::Integral { decay } => integral(bars, &mut memory.integral, decay),
                FilterStage::Gravity {
                    constant,
                    reference_rate,
                    exponent,
                    fall_step,
                } => {
                    let g = constant * (reference_rate / self.frame_rate).powf(exponent);
                    gravity(bars, memory, g, fall_step)
                }
            }
        }
    }
}

/// `bar[i] *= weight[i]`
pub fn frequency_weight(bars: &mut [f32], weights: &[f32]) {
    for (bar, weight) in bars.iter_mut().zip(weights) {
        *bar *= weight;
    }
}

/// Centered moving average over `points` neighbors, repeated `passes` times.
/// The outer `points / 2` bars on each side are left as they are.
pub fn spatial_smooth(bars: &mut [f32], scratch: &mut Vec<f32>, passes: usize, points: usize) {
    let side = points / 2;
    let n = bars.len();
    if side == 0 || n <= 2 * side {
        return;
    }
    let norm = 1.0 / points as f32;
    for _ in 0..passes {
        scratch.clear();
        scratch.extend_from_slice(bars);
        for i in side..n - side {
            bars[i] = scratch[i - side..=i + side].iter().sum::<f32>() * norm;
        }
    }
}

/// Multiplier [`margin_taper`] applies to bar `i` of `bars`.
pub fn margin_multiplier(
    i: usize,
    bars: usize,
    head: usize,
    tail: usize,
    decay: f32,
    min_weight: f32,
) -> f32 {
    let slope = |margin: usize| (1.0 - min_weight) / (margin as f32).powf(decay);
    if i < head {
        slope(head) * ((i + 1) as f32).powf(decay) + min_weight
    } else if tail > 0 && bars - i <= tail {
        slope(tail) * ((bars - i) as f32).powf(decay) + min_weight
    } else {
        1.0
    }
}

/// Fade the head and tail margins toward `min_weight`.
pub fn margin_taper(bars: &mut [f32], head: usize, tail: usize, decay: f32, min_weight: f32) {
    let n = bars.len();
    for (i, bar) in bars.iter_mut().enumerate() {
        *bar *= margin_multiplier(i, n, head, tail, decay, min_weight);
    }
}

/// Raise every bar to at least `bar[z] / factor^|z - y|` for every other bar `z`.
pub fn monstercat(bars: &mut [f32], factor: f32) {
    let n = bars.len();
    for z in 0..n {
        if bars[z] < MONSTERCAT_FLOOR {
            bars[z] = MONSTERCAT_FLOOR;
        }
        let source = bars[z];
        for y in 0..n {
            if y == z {
                continue;
            }
            let spread = source / factor.powi(z.abs_diff(y) as i32);
            if spread > bars[y] {
                bars[y] = spread;
            }
        }
    }
}

/// Exponential memory per bar.
pub fn integral(bars: &mut [f32], memory: &mut [f32], decay: f32) {
    for (bar, mem) in bars.iter_mut().zip(memory.iter_mut()) {
        *mem = *mem * decay + *bar;
        *bar = *mem;
    }
}

/// Hold each peak and let it fall with `g * fall^2` while input stays below
/// the previously emitted value.
pub fn gravity(bars: &mut [f32], memory: &mut FilterMemory, g: f32, fall_step: f32) {
    for (i, bar) in bars.iter_mut().enumerate() {
        if *bar < memory.last[i] {
            let fall = memory.fall[i];
            *bar = (memory.peak[i] - g * fall * fall).max(0.0);
            memory.fall[i] += fall_step;
        } else {
            memory.peak[i] = *bar;
            memory.fall[i] = 0.0;
        }
        memory.last[i] = *bar;
    }
}
