// src/audio/mod.rs
//! Audio module - sample sources, the live capture ring and optional playback.

pub mod callback;
pub mod file;
pub mod playback;
pub mod polled;
pub mod ring;
pub mod source;

// Re-export commonly used types
pub use callback::CallbackSource;
pub use file::FileSource;
pub use playback::Playback;
pub use polled::PolledSource;
pub use ring::{capture_ring, RingReader, RingWriter};
pub use source::{
    open_source, select_ranked, select_source, Channel, RetryPolicy, SampleSource, SourceKind,
    I16_SCALE,
};
