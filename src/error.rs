use std::path::PathBuf;

/// Errors produced by the playback pipeline.
///
/// Only `MediaOpen` and `EmptySource` are fatal to a job. A missing or
/// unusable accelerator and any audio trouble are recovered locally by the
/// caller (CPU fallback, muted playback) and never abort video playback.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot open media source {path}: {reason}")]
    MediaOpen { path: PathBuf, reason: String },

    #[error("media source {0} contains no frames")]
    EmptySource(PathBuf),

    #[error("compute device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("audio extraction failed: {0}")]
    AudioExtraction(String),

    #[error("glyph palette must contain at least one glyph")]
    EmptyPalette,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
