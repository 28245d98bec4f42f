//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::{f32::consts::PI, path::Path};

use bandscope::{
    audio::Channel,
    render::{Geometry, Renderer, RendererSignal},
    Result,
};

/// Renderer that keeps every drawn bar array in memory.
#[derive(Default)]
pub struct RecordingRenderer {
    pub geometries: Vec<Geometry>,
    /// One entry per presented frame: (output, channel, bars)
    pub frames: Vec<Vec<(usize, Channel, Vec<f32>)>>,
    pending: Vec<(usize, Channel, Vec<f32>)>,
    pub finished: bool,
}

impl RecordingRenderer {
    pub fn new(geometries: Vec<Geometry>) -> Self {
        Self {
            geometries,
            ..Self::default()
        }
    }

    /// Bars drawn for `channel` of output 0 in frame `frame`.
    pub fn bars(&self, frame: usize, channel: Channel) -> &[f32] {
        self.frames[frame]
            .iter()
            .find(|(output, ch, _)| *output == 0 && *ch == channel)
            .map(|(_, _, bars)| bars.as_slice())
            .unwrap()
    }
}

impl Renderer for RecordingRenderer {
    fn outputs(&mut self) -> Result<Vec<Geometry>> {
        Ok(self.geometries.clone())
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn draw(&mut self, output: usize, _: &Geometry, channel: Channel, bars: &[f32]) -> Result<()> {
        self.pending.push((output, channel, bars.to_vec()));
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.frames.push(std::mem::take(&mut self.pending));
        Ok(())
    }

    fn poll(&mut self) -> Result<RendererSignal> {
        Ok(RendererSignal::None)
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Interleaved stereo sine, same tone on both channels.
pub fn stereo_sine(freq: f32, amplitude: f32, sample_rate: u32, frames: usize) -> Vec<i16> {
    (0..frames)
        .flat_map(|i| {
            let t = i as f32 / sample_rate as f32;
            let v = (amplitude * (2.0 * PI * freq * t).sin()) as i16;
            [v, v]
        })
        .collect()
}

/// Write a 16-bit WAV with `channels` channels.
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}
