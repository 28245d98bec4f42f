// src/audio/callback.rs
//! Live source fed by the audio driver's input callback.

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
};
use tracing::{info, warn};

use crate::{
    config::AudioConfig,
    error::{BandscopeError, Result},
};

use super::{
    ring::{capture_ring, RingReader, RingWriter},
    source::{Channel, SampleSource, SourceKind, I16_SCALE},
};

/// Samples staged on the callback's stack before each push.
const CHUNK_SAMPLES: usize = 512;

/// Default input device captured through a cpal stream.
///
/// The driver thread converts each chunk to stereo in 16-bit units and pushes
/// it into the capture ring without allocating or blocking.
pub struct CallbackSource {
    reader: RingReader,
    // dropping the stream stops the driver callback
    _stream: Stream,
}

impl CallbackSource {
    pub fn open(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            BandscopeError::SourceUnavailable("no default input device".to_string())
        })?;
        let supported = device
            .default_input_config()
            .map_err(|e| BandscopeError::SourceUnavailable(format!("input config: {e}")))?;

        let sample_rate = supported.sample_rate().0;
        let channels = usize::from(supported.channels()).max(1);
        let stream_config: StreamConfig = supported.config();
        let (writer, reader) = capture_ring(config, sample_rate);

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, channels, writer),
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, channels, writer),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, channels, writer),
            other => Err(BandscopeError::SourceUnavailable(format!(
                "unsupported input sample format {other:?}"
            ))),
        }?;
        stream
            .play()
            .map_err(|e| BandscopeError::SourceUnavailable(format!("start input stream: {e}")))?;

        info!(
            device = device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate,
            channels,
            "capturing from input device"
        );

        Ok(Self {
            reader,
            _stream: stream,
        })
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    mut writer: RingWriter,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut staged = [0.0f32; CHUNK_SAMPLES];

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut filled = 0;
                for frame in data.chunks(channels) {
                    let left = frame[0].to_sample::<f32>();
                    // mono input feeds both channels
                    let right = frame.get(1).map_or(left, |&s| s.to_sample::<f32>());
                    staged[filled] = left * I16_SCALE;
                    staged[filled + 1] = right * I16_SCALE;
                    filled += 2;
                    if filled == CHUNK_SAMPLES {
                        writer.push_interleaved(&staged);
                        filled = 0;
                    }
                }
                if filled > 0 {
                    writer.push_interleaved(&staged[..filled]);
                }
            },
            |err| warn!(error = %err, "input stream error"),
            None,
        )
        .map_err(|e| BandscopeError::SourceUnavailable(format!("build input stream: {e}")))
}

impl SampleSource for CallbackSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Callback
    }

    fn sample_rate(&self) -> u32 {
        self.reader.sample_rate()
    }

    fn window(&mut self, elapsed_ms: u64, channel: Channel, out: &mut [f32]) -> Result<()> {
        self.reader.window(elapsed_ms, channel, out)
    }
}
