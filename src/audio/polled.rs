// src/audio/polled.rs
//! Live source fed by a reader thread doing blocking reads of raw PCM.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use tracing::{debug, info, warn};

use crate::{
    config::AudioConfig,
    error::{BandscopeError, Result},
};

use super::{
    ring::{capture_ring, RingReader, RingWriter},
    source::{Channel, SampleSource, SourceKind},
};

/// Bytes in one s16le stereo frame.
const FRAME_BYTES: usize = 4;

/// Interleaved signed 16-bit little-endian stereo PCM read from a FIFO,
/// a file or stdin.
pub struct PolledSource {
    reader: RingReader,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PolledSource {
    /// Start reading the configured FIFO path. `-` reads stdin.
    pub fn open(config: &AudioConfig) -> Result<Self> {
        let path = config.fifo.clone().ok_or_else(|| {
            BandscopeError::SourceUnavailable("no FIFO path given".to_string())
        })?;
        let frames_per_read = (config.fifo_sample_rate / config.frame_rate.max(1)).max(1) as usize;

        if path.as_os_str() == "-" {
            info!("reading PCM from stdin");
            return Self::spawn(io::stdin(), config, frames_per_read);
        }
        check_readable(&path)?;
        info!(path = %path.display(), "reading PCM from FIFO");
        Self::spawn(LazyFile::new(path), config, frames_per_read)
    }

    /// Start a reader thread over any byte stream.
    pub fn spawn<R>(input: R, config: &AudioConfig, frames_per_read: usize) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (writer, reader) = capture_ring(config, config.fifo_sample_rate);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("pcm-reader".into())
            .spawn(move || read_loop(input, writer, frames_per_read, &thread_stop))
            .map_err(|e| {
                BandscopeError::SourceUnavailable(format!("spawn PCM reader thread: {e}"))
            })?;

        Ok(Self {
            reader,
            stop,
            handle,
        })
    }

    /// Whether the reader thread has exited, e.g. at end of input.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Open `path` without waiting for a FIFO writer, so missing paths and
/// permission errors surface before the reader thread starts.
fn check_readable(path: &Path) -> Result<()> {
    let unavailable =
        |reason: String| BandscopeError::SourceUnavailable(format!("{}: {reason}", path.display()));

    let metadata = fs::metadata(path).map_err(|e| unavailable(e.to_string()))?;
    if metadata.is_dir() {
        return Err(unavailable("is a directory".to_string()));
    }

    let mut options = OpenOptions::new();
    options.read(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.custom_flags(libc::O_NONBLOCK);
    }
    options
        .open(path)
        .map(drop)
        .map_err(|e| unavailable(e.to_string()))
}

impl Drop for PolledSource {
    fn drop(&mut self) {
        // the thread may be parked in a blocking read, so it is detached
        self.stop.store(true, Ordering::Release);
    }
}

impl SampleSource for PolledSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Polled
    }

    fn sample_rate(&self) -> u32 {
        self.reader.sample_rate()
    }

    fn window(&mut self, elapsed_ms: u64, channel: Channel, out: &mut [f32]) -> Result<()> {
        self.reader.window(elapsed_ms, channel, out)
    }
}

fn read_loop<R: Read>(
    mut input: R,
    mut writer: RingWriter,
    frames_per_read: usize,
    stop: &AtomicBool,
) {
    let mut bytes = vec![0u8; frames_per_read * FRAME_BYTES];
    let mut samples = vec![0.0f32; frames_per_read * 2];
    let mut filled = 0;
    let mut total_frames: u64 = 0;

    while !stop.load(Ordering::Acquire) {
        match input.read(&mut bytes[filled..]) {
            Ok(0) => {
                info!(frames = total_frames, "PCM input closed");
                break;
            }
            Ok(n) => {
                filled += n;
                let whole = filled / FRAME_BYTES * FRAME_BYTES;
                let count = whole / 2;
                let raw_samples = bytes[..whole].chunks_exact(2);
                for (sample, raw) in samples[..count].iter_mut().zip(raw_samples) {
                    *sample = f32::from(i16::from_le_bytes([raw[0], raw[1]]));
                }
                total_frames += writer.push_interleaved(&samples[..count]) as u64;
                // carry a partial frame over to the next read
                bytes.copy_within(whole..filled, 0);
                filled -= whole;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "PCM read failed");
                break;
            }
        }
    }
    debug!("PCM reader thread exiting");
}

/// Opens its path on first read so a FIFO without a writer does not block startup.
struct LazyFile {
    path: PathBuf,
    file: Option<File>,
}

impl LazyFile {
    fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }
}

impl Read for LazyFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.file.is_none() {
            let file = File::open(&self.path)?;
            debug!(path = %self.path.display(), "FIFO opened");
            self.file = Some(file);
        }
        match self.file.as_mut() {
            Some(file) => file.read(buf),
            None => Ok(0),
        }
    }
}
