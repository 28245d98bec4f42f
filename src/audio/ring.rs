// src/audio/ring.rs
//! Lock-free single-producer/single-consumer ring of interleaved stereo samples.
//!
//! A live writer thread pushes whole frames into a [`RingWriter`]. The
//! scheduler thread drains them through a [`RingReader`] into a local history
//! and reads windows out of it by elapsed time. The ring indices act as the
//! published cursor: the reader only ever sees frames the writer has finished.
//!
//! The read position trails the writer by a fixed latency so that a writer
//! delivering in driver-sized chunks stays ahead of the wall clock.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use tracing::{debug, warn};

use crate::{
    config::AudioConfig,
    error::{BandscopeError, Result},
};

use super::source::Channel;

const CHANNELS: usize = 2;
const DRAIN_CHUNK: usize = 1024;

/// Create a connected writer/reader pair for a stream at `sample_rate`,
/// sized and tuned from `config`.
pub fn capture_ring(config: &AudioConfig, sample_rate: u32) -> (RingWriter, RingReader) {
    let capacity_frames = config.ring_frames.max(1);
    let capacity = capacity_frames * CHANNELS;
    let (prod, cons) = HeapRb::<f32>::new(capacity).split();
    let dropped = Arc::new(AtomicU64::new(0));

    let latency = u64::from(sample_rate) * u64::from(config.latency_ms) / 1000;
    let writer = RingWriter {
        prod,
        dropped: dropped.clone(),
    };
    let reader = RingReader {
        cons,
        history: vec![0.0; capacity],
        drain: vec![0.0; DRAIN_CHUNK],
        published: 0,
        sample_rate,
        latency: latency.min(capacity_frames as u64 / 2),
        anchor: None,
        misses: 0,
        last_miss_ms: None,
        resync_after: config.resync_after.max(1),
        dropped,
        dropped_seen: 0,
    };
    (writer, reader)
}

/// Producer half. Never blocks and never allocates.
pub struct RingWriter {
    prod: HeapProd<f32>,
    dropped: Arc<AtomicU64>,
}

impl RingWriter {
    /// Push interleaved stereo samples, whole frames only.
    ///
    /// Returns the number of frames written. Frames that do not fit are
    /// dropped and counted.
    pub fn push_interleaved(&mut self, samples: &[f32]) -> usize {
        let frames = samples.len() / CHANNELS;
        let room = self.prod.vacant_len() / CHANNELS;
        let take = frames.min(room);
        let written = self.prod.push_slice(&samples[..take * CHANNELS]) / CHANNELS;
        if written < frames {
            self.dropped
                .fetch_add((frames - written) as u64, Ordering::Relaxed);
        }
        written
    }
}

/// Consumer half, owned by the scheduler thread.
pub struct RingReader {
    cons: HeapCons<f32>,
    /// Most recent samples, indexed by absolute sample position modulo length
    history: Vec<f32>,
    drain: Vec<f32>,
    /// Total samples drained from the writer so far
    published: u64,
    sample_rate: u32,
    /// Frames the read position trails the writer by when anchored
    latency: u64,
    /// Offset in frames between the wall-clock position and the ring position,
    /// set once enough frames have arrived
    anchor: Option<i64>,
    /// Consecutive ticks that missed
    misses: u32,
    last_miss_ms: Option<u64>,
    resync_after: u32,
    dropped: Arc<AtomicU64>,
    dropped_seen: u64,
}

impl RingReader {
    /// Drain everything the writer has published into the local history.
    pub fn pull(&mut self) {
        let len = self.history.len();
        loop {
            let n = self.cons.pop_slice(&mut self.drain);
            if n == 0 {
                break;
            }
            for &sample in &self.drain[..n] {
                self.history[(self.published % len as u64) as usize] = sample;
                self.published += 1;
            }
        }

        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > self.dropped_seen {
            warn!(
                dropped = dropped - self.dropped_seen,
                total = dropped,
                "capture ring full, frames dropped"
            );
            self.dropped_seen = dropped;
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames published by the writer and drained so far.
    pub fn published_frames(&self) -> u64 {
        self.published / CHANNELS as u64
    }

    /// Frames dropped because the ring was full.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn capacity_frames(&self) -> u64 {
        (self.history.len() / CHANNELS) as u64
    }

    fn position(&self, wall: i64) -> u64 {
        self.anchor.map_or(0, |anchor| (wall + anchor).max(0) as u64)
    }

    /// Line the position for `wall` up with `latency` frames before the newest one.
    fn anchor_to_writer(&mut self, wall: i64, published: u64) {
        self.anchor = Some(published as i64 - self.latency as i64 - wall);
    }

    /// Copy the `out.len()` frames of `channel` ending at the ring position for
    /// `elapsed_ms`.
    ///
    /// The position is anchored `latency` frames behind the writer on the first
    /// call that finds enough frames. Returns [`BandscopeError::Underrun`] when
    /// the writer has not published that far. Misses are counted once per
    /// `elapsed_ms`, so every channel and output read in one tick counts once;
    /// after `resync_after` missed ticks the position is re-anchored.
    pub fn window(&mut self, elapsed_ms: u64, channel: Channel, out: &mut [f32]) -> Result<()> {
        self.pull();

        let len = out.len() as u64;
        let published = self.published_frames();
        let wall = (u64::from(self.sample_rate) * elapsed_ms / 1000) as i64;
        let mut pos = self.position(wall);

        if self.anchor.is_none() || pos > published || pos < len {
            if self.anchor.is_some() && self.last_miss_ms != Some(elapsed_ms) {
                self.last_miss_ms = Some(elapsed_ms);
                self.misses += 1;
            }
            let due = self.anchor.is_none() || self.misses >= self.resync_after;
            if !due || published < len + self.latency {
                return Err(BandscopeError::Underrun {
                    requested: pos,
                    published,
                });
            }
            self.anchor_to_writer(wall, published);
            pos = self.position(wall);
            debug!(anchor = ?self.anchor, published, misses = self.misses, "anchored live window");
        }
        self.misses = 0;

        let mut end = pos;
        if published - end + len > self.capacity_frames() {
            // the requested frames were already overwritten; jump to the newest
            self.anchor_to_writer(wall, published);
            end = self.position(wall);
            debug!(anchor = ?self.anchor, "live window fell behind, snapped forward");
        }

        let history_len = self.history.len() as u64;
        let start = end - len;
        for (k, value) in out.iter_mut().enumerate() {
            let sample = (start + k as u64) * CHANNELS as u64 + channel.index() as u64;
            *value = self.history[(sample % history_len) as usize];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize, start: f32) -> Vec<f32> {
        (0..n)
            .flat_map(|i| {
                let v = start + i as f32;
                [v, -v]
            })
            .collect()
    }

    fn ring(
        capacity_frames: usize,
        latency_ms: u32,
        resync_after: u32,
    ) -> (RingWriter, RingReader) {
        let config = AudioConfig {
            ring_frames: capacity_frames,
            latency_ms,
            resync_after,
            ..AudioConfig::default()
        };
        capture_ring(&config, 1000)
    }

    #[test]
    fn test_reader_sees_whole_frames() {
        let (mut writer, mut reader) = ring(8, 0, 8);
        // odd tail sample is not a full frame
        assert_eq!(writer.push_interleaved(&[1.0, 2.0, 3.0]), 1);
        reader.pull();
        assert_eq!(reader.published_frames(), 1);
    }

    #[test]
    fn test_window_trails_writer_by_latency() {
        // 2 ms at 1 kHz is 2 frames behind the newest
        let (mut writer, mut reader) = ring(64, 2, 8);
        writer.push_interleaved(&frames(20, 0.0));

        let mut out = [0.0; 4];
        reader.window(10, Channel::Left, &mut out).unwrap();
        assert_eq!(out, [14.0, 15.0, 16.0, 17.0]);
        reader.window(10, Channel::Right, &mut out).unwrap();
        assert_eq!(out, [-14.0, -15.0, -16.0, -17.0]);

        // 2 ms later the window has moved 2 frames
        writer.push_interleaved(&frames(5, 20.0));
        reader.window(12, Channel::Left, &mut out).unwrap();
        assert_eq!(out, [16.0, 17.0, 18.0, 19.0]);
    }

    #[test]
    fn test_underrun_when_writer_is_behind() {
        let (mut writer, mut reader) = ring(64, 0, 8);
        writer.push_interleaved(&frames(2, 0.0));

        let mut out = [0.0; 4];
        // not enough frames for a full window yet
        assert!(matches!(
            reader.window(0, Channel::Left, &mut out),
            Err(BandscopeError::Underrun {
                requested: 0,
                published: 2
            })
        ));

        writer.push_interleaved(&frames(3, 2.0));
        reader.window(0, Channel::Left, &mut out).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);

        let err = reader.window(20, Channel::Left, &mut out).unwrap_err();
        assert!(matches!(
            err,
            BandscopeError::Underrun {
                requested: 25,
                published: 5
            }
        ));
    }

    #[test]
    fn test_reanchors_after_missed_ticks() {
        let (mut writer, mut reader) = ring(64, 0, 3);
        writer.push_interleaved(&frames(10, 0.0));

        let mut out = [0.0; 4];
        reader.window(0, Channel::Left, &mut out).unwrap();

        // both channels of one tick count as a single miss
        assert!(reader.window(100, Channel::Left, &mut out).is_err());
        assert!(reader.window(100, Channel::Right, &mut out).is_err());
        assert!(reader.window(101, Channel::Left, &mut out).is_err());
        assert!(reader.window(101, Channel::Right, &mut out).is_err());

        // third missed tick lines the position up with the newest frame
        reader.window(102, Channel::Left, &mut out).unwrap();
        assert_eq!(out, [6.0, 7.0, 8.0, 9.0]);
        reader.window(102, Channel::Right, &mut out).unwrap();
        assert_eq!(out, [-6.0, -7.0, -8.0, -9.0]);
    }

    #[test]
    fn test_full_ring_drops_and_counts() {
        let (mut writer, mut reader) = ring(4, 0, 8);
        assert_eq!(writer.push_interleaved(&frames(6, 0.0)), 4);
        assert_eq!(reader.dropped_frames(), 2);
        reader.pull();
        assert_eq!(writer.push_interleaved(&frames(2, 10.0)), 2);
        reader.pull();
        assert_eq!(reader.published_frames(), 6);
    }

    #[test]
    fn test_lagging_reader_snaps_to_latest() {
        let (mut writer, mut reader) = ring(8, 0, 8);
        writer.push_interleaved(&frames(8, 0.0));
        let mut out = [0.0; 4];
        reader.window(0, Channel::Left, &mut out).unwrap();
        assert_eq!(out, [4.0, 5.0, 6.0, 7.0]);

        for chunk in 1..4 {
            writer.push_interleaved(&frames(8, chunk as f32 * 8.0));
            reader.pull();
        }
        // frames 4..8 were overwritten long ago; expect the newest 4 frames
        reader.window(0, Channel::Left, &mut out).unwrap();
        assert_eq!(out, [28.0, 29.0, 30.0, 31.0]);
    }

    #[test]
    fn test_steady_writer_keeps_reader_fed() {
        const RATE: u64 = 44100;
        let config = AudioConfig::default();

        for chunk in [441u64, 1024, 2048] {
            for phase in 0..8 {
                let offset = chunk * phase / 8;
                let (mut writer, mut reader) = capture_ring(&config, RATE as u32);
                let block = vec![0.25f32; chunk as usize * 2];
                let mut out = vec![0.0f32; config.fft_size];
                let mut pushed = 0;
                let mut late = 0;

                // 10 s at 60 ticks per second
                for tick in 0..600u64 {
                    let elapsed_ms = tick * 1000 / 60;
                    let wall = RATE * elapsed_ms / 1000;
                    // every chunk whose last frame is due has been delivered
                    while offset + pushed + chunk <= wall {
                        writer.push_interleaved(&block);
                        pushed += chunk;
                    }
                    let left = reader.window(elapsed_ms, Channel::Left, &mut out);
                    let right = reader.window(elapsed_ms, Channel::Right, &mut out);
                    // the first ticks wait for one window plus the latency
                    if tick >= 30 && (left.is_err() || right.is_err()) {
                        late += 1;
                    }
                }
                assert_eq!(late, 0, "chunk {chunk}, phase {phase}");
                assert_eq!(reader.dropped_frames(), 0);
            }
        }
    }
}
