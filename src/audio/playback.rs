// src/audio/playback.rs
//! Optional audible playback of the input file while it is visualized.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::mpsc::{self, Sender},
    thread,
};

use rodio::{Decoder, OutputStream, Sink};
use tracing::{debug, info, warn};

/// Commands sent to the playback thread.
enum PlaybackCommand {
    Stop,
}

/// Plays one file on the default output device from a dedicated thread.
///
/// Failures are logged and never interrupt visualization. Playback stops when
/// this handle is dropped.
pub struct Playback {
    cmd_tx: Sender<PlaybackCommand>,
}

impl Playback {
    /// Start playing `path` immediately.
    pub fn start(path: &Path) -> Self {
        let (tx, rx) = mpsc::channel::<PlaybackCommand>();
        let path: PathBuf = path.to_path_buf();

        // The thread owns the OutputStream, which must stay alive while playing
        let spawned = thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "no audio output, playback disabled");
                        return;
                    }
                };

                let sink = match open_sink(&handle, &path) {
                    Ok(sink) => sink,
                    Err(reason) => {
                        warn!(path = %path.display(), %reason, "playback disabled");
                        return;
                    }
                };
                sink.play();
                info!(path = %path.display(), "playback started");

                // Stop command or a dropped handle both end playback
                match rx.recv() {
                    Ok(PlaybackCommand::Stop) | Err(_) => sink.stop(),
                }
                debug!("playback stopped");
                drop(stream);
            });

        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn playback thread");
        }

        Self { cmd_tx: tx }
    }

    /// Halt playback.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(PlaybackCommand::Stop);
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_sink(handle: &rodio::OutputStreamHandle, path: &Path) -> Result<Sink, String> {
    let sink = Sink::try_new(handle).map_err(|e| e.to_string())?;
    let file = File::open(path).map_err(|e| e.to_string())?;
    let source = Decoder::new(BufReader::new(file)).map_err(|e| e.to_string())?;
    sink.append(source);
    Ok(sink)
}
