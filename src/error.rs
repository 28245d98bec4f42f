// src/error.rs
//! Error taxonomy shared by the audio sources, the spectrum pipeline and the scheduler.

use thiserror::Error;

/// Errors produced by the bandscope core.
#[derive(Error, Debug)]
pub enum BandscopeError {
    /// Invalid configuration value, fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A sample source could not be initialized; the next ranked source is tried.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Input file uses a container or sample layout we do not decode.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The reader asked for samples the writer has not published yet.
    #[error("underrun: window ends at frame {requested}, writer published {published}")]
    Underrun {
        /// Frame index one past the requested window.
        requested: u64,
        /// Stereo frames published by the writer so far.
        published: u64,
    },

    /// A file-backed source ran out of samples.
    #[error("end of stream")]
    EndOfStream,

    /// Renderer collaborator failure.
    #[error("render error: {0}")]
    Render(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BandscopeError {
    /// Errors a tick can absorb by repeating its previous output.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Underrun { .. })
    }
}

/// Result type for bandscope operations
pub type Result<T> = std::result::Result<T, BandscopeError>;
