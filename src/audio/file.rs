// src/audio/file.rs
//! Finite sample source backed by a decoded 16-bit stereo WAV file.

use std::{io::Read, path::Path};

use hound::{SampleFormat, WavReader};
use tracing::{info, warn};

use crate::error::{BandscopeError, Result};

use super::source::{Channel, SampleSource, SourceKind};

/// Whole-file sample buffer addressed by elapsed time.
pub struct FileSource {
    sample_rate: u32,
    /// Interleaved stereo samples in signed 16-bit amplitude units
    samples: Vec<f32>,
}

impl FileSource {
    /// Decode `path`. A missing or unreadable file is unavailable; a file in
    /// an unsupported format is malformed.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path).map_err(|e| match e {
            hound::Error::IoError(io) => {
                BandscopeError::SourceUnavailable(format!("{}: {io}", path.display()))
            }
            other => BandscopeError::MalformedInput(format!("{}: {other}", path.display())),
        })?;
        let source = Self::from_reader(reader)?;
        info!(
            path = %path.display(),
            sample_rate = source.sample_rate,
            duration_ms = source.duration_ms(),
            "decoded input file"
        );
        Ok(source)
    }

    /// Decode from any WAV reader. Only 2-channel 16-bit integer PCM is accepted.
    pub fn from_reader<R: Read>(reader: WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        if spec.channels != 2 {
            return Err(BandscopeError::MalformedInput(format!(
                "expected 2 channels, found {}",
                spec.channels
            )));
        }
        if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
            return Err(BandscopeError::MalformedInput(format!(
                "expected 16-bit integer samples, found {}-bit {:?}",
                spec.bits_per_sample, spec.sample_format
            )));
        }

        let mut samples = Vec::with_capacity(reader.len() as usize);
        for sample in reader.into_samples::<i16>() {
            match sample {
                Ok(s) => samples.push(f32::from(s)),
                Err(e) => {
                    warn!(error = %e, decoded = samples.len(), "truncated sample data");
                    break;
                }
            }
        }
        // keep whole frames only
        samples.truncate(samples.len() & !1);

        Ok(Self::from_samples(spec.sample_rate, samples))
    }

    /// Wrap already-decoded interleaved stereo samples.
    pub fn from_samples(sample_rate: u32, interleaved: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples: interleaved,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }
}

impl SampleSource for FileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn window(&mut self, elapsed_ms: u64, channel: Channel, out: &mut [f32]) -> Result<()> {
        let offset = (self.sample_rate as u64 * elapsed_ms / 1000) as usize;
        if offset + out.len() > self.frames() {
            return Err(BandscopeError::EndOfStream);
        }
        let frames = self.samples[offset * 2..].chunks_exact(2);
        for (value, frame) in out.iter_mut().zip(frames) {
            *value = frame[channel.index()];
        }
        Ok(())
    }
}
