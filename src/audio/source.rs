// src/audio/source.rs
//! The sample source abstraction and ranked source selection.

use std::{thread, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    config::AudioConfig,
    error::{BandscopeError, Result},
};

use super::{callback::CallbackSource, file::FileSource, polled::PolledSource};

/// Scale from normalized float samples to signed 16-bit amplitude units.
pub const I16_SCALE: f32 = 32768.0;

/// Stereo channel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    /// Both channels in render order.
    pub const BOTH: [Channel; 2] = [Channel::Left, Channel::Right];

    /// Offset of this channel within an interleaved stereo frame.
    pub fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }
}

/// Where samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Decoded WAV file
    File,
    /// Audio driver pushing chunks from its own thread
    Callback,
    /// Dedicated thread doing blocking reads of raw PCM
    Polled,
}

/// A rolling window of stereo samples addressed by elapsed time.
pub trait SampleSource {
    fn kind(&self) -> SourceKind;

    fn sample_rate(&self) -> u32;

    /// Fill `out` with `out.len()` samples of `channel` for the window at
    /// `elapsed_ms` since the scheduler started.
    ///
    /// Fails with [`BandscopeError::EndOfStream`] when a finite source is
    /// exhausted and [`BandscopeError::Underrun`] when a live writer has not
    /// published the requested samples yet.
    fn window(&mut self, elapsed_ms: u64, channel: Channel, out: &mut [f32]) -> Result<()>;
}

/// Bounded retry for live source initialization.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Single attempt, no sleeping.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// Open one source kind from configuration.
pub fn open_source(kind: SourceKind, config: &AudioConfig) -> Result<Box<dyn SampleSource>> {
    match kind {
        SourceKind::File => {
            let path = config.file.as_deref().ok_or_else(|| {
                BandscopeError::SourceUnavailable("no input file given".to_string())
            })?;
            Ok(Box::new(FileSource::open(path)?))
        }
        SourceKind::Callback => Ok(Box::new(CallbackSource::open(config)?)),
        SourceKind::Polled => Ok(Box::new(PolledSource::open(config)?)),
    }
}

/// Try each configured source kind in order and return the first that opens.
pub fn select_source(config: &AudioConfig) -> Result<Box<dyn SampleSource>> {
    select_ranked(&config.sources, RetryPolicy::from_config(config), |kind| {
        open_source(kind, config)
    })
}

/// Ranked fallback over `kinds` using `open` as the factory.
///
/// Live kinds are retried with doubling backoff; the file kind gets a single
/// attempt. Only [`BandscopeError::SourceUnavailable`] moves on to the next
/// kind, every other error is returned as-is.
pub fn select_ranked<F>(
    kinds: &[SourceKind],
    retry: RetryPolicy,
    mut open: F,
) -> Result<Box<dyn SampleSource>>
where
    F: FnMut(SourceKind) -> Result<Box<dyn SampleSource>>,
{
    let mut failures = Vec::new();

    for &kind in kinds {
        let attempts = match kind {
            SourceKind::File => 1,
            SourceKind::Callback | SourceKind::Polled => retry.attempts.max(1),
        };
        let mut backoff = retry.backoff;

        for attempt in 1..=attempts {
            match open(kind) {
                Ok(source) => {
                    info!(
                        ?kind,
                        sample_rate = source.sample_rate(),
                        attempt,
                        "sample source ready"
                    );
                    return Ok(source);
                }
                Err(BandscopeError::SourceUnavailable(reason)) => {
                    warn!(?kind, attempt, %reason, "sample source unavailable");
                    if attempt == attempts {
                        failures.push(format!("{kind:?}: {reason}"));
                    } else if !backoff.is_zero() {
                        thread::sleep(backoff);
                        backoff *= 2;
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    Err(BandscopeError::SourceUnavailable(format!(
        "no usable audio source ({})",
        failures.join("; ")
    )))
}
