//! # tascii - terminal ASCII video player
//!
//! `tascii` plays a video file in the terminal as a sequence of text frames
//! composed from a small glyph palette, paced to approximate the source
//! frame rate and optionally accompanied by the source's audio track.
//!
//! ## Features
//!
//! - Grayscale-to-glyph conversion with a configurable dark-to-light ramp
//! - Two interchangeable conversion strategies producing byte-identical
//!   output: a rayon-parallel CPU path and a wgpu compute path
//! - Streaming playback (CPU) or pre-load-then-replay playback (GPU)
//! - Loop mode and cooperative ctrl-c cancellation
//! - Best-effort audio extraction and playback via ffmpeg/ffplay
//!
//! Decoding relies on `ffmpeg` and `ffprobe` being available in PATH.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tascii::{player, CancelFlag, PlaybackJob};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let job = PlaybackJob::new(PathBuf::from("clip.mp4"));
//! let cancel = CancelFlag::new();
//! player::play(&job, &cancel, |loaded, total| {
//!     println!("loading {loaded}/{total}");
//! })?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use serde::Deserialize;

pub mod audio;
pub mod device;
pub mod error;
pub mod gpu;
pub mod mapper;
pub mod palette;
pub mod player;
pub mod source;
pub mod term;

pub use device::{list_devices, DeviceDescriptor, DeviceKind};
pub use error::{Error, Result};
pub use mapper::{FrameMapper, PlayMode};
pub use palette::{GlyphPalette, DEFAULT_GLYPHS};
pub use player::CancelFlag;
pub use source::{FrameSource, GrayFrame, VideoSource};

/// Default output width in characters.
pub const DEFAULT_WIDTH: u32 = 160;

/// Everything one playback run needs. Constructed once from CLI/config
/// input and read-only afterwards; the palette travels with the job instead
/// of living in shared state.
#[derive(Debug, Clone)]
pub struct PlaybackJob {
    /// Path to the video source.
    pub source: PathBuf,
    /// Output width in characters (>= 1).
    pub width: u32,
    /// Device selector: `None`/"cpu..." for the CPU path, otherwise a
    /// case-insensitive substring of an accelerator name, optionally
    /// prefixed with `accelerator:`.
    pub device: Option<String>,
    /// Explicit per-frame delay in seconds; `None` derives the delay from
    /// the source frame rate.
    pub delay: Option<f64>,
    /// Restart from the first frame at end of stream.
    pub looping: bool,
    /// Start the audio companion alongside video playback.
    pub audio: bool,
    /// Dark-to-light glyph ramp used for every frame of this job.
    pub palette: GlyphPalette,
}

impl PlaybackJob {
    /// Job with the built-in defaults for everything but the source path.
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            width: DEFAULT_WIDTH,
            device: None,
            delay: None,
            looping: false,
            audio: true,
            palette: GlyphPalette::default(),
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width.max(1);
        self
    }

    pub fn with_device(mut self, device: Option<String>) -> Self {
        self.device = device;
        self
    }

    pub fn with_delay(mut self, delay: Option<f64>) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_palette(mut self, palette: GlyphPalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_audio(mut self, audio: bool) -> Self {
        self.audio = audio;
        self
    }
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_glyphs() -> String {
    DEFAULT_GLYPHS.to_string()
}

/// User configuration overriding the built-in job defaults; loaded from a
/// JSON file by the binary, every field optional.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    /// Explicit default delay in seconds; absent means derive from the
    /// source frame rate.
    #[serde(default)]
    pub delay: Option<f64>,
    #[serde(default = "default_glyphs")]
    pub glyphs: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            delay: None,
            glyphs: DEFAULT_GLYPHS.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_defaults() {
        let job = PlaybackJob::new(PathBuf::from("x.mp4"));
        assert_eq!(job.width, 160);
        assert!(job.device.is_none());
        assert!(job.delay.is_none());
        assert!(!job.looping);
        assert!(job.audio);
        assert_eq!(job.palette, GlyphPalette::default());
    }

    #[test]
    fn width_floor_is_one() {
        let job = PlaybackJob::new(PathBuf::from("x.mp4")).with_width(0);
        assert_eq!(job.width, 1);
    }

    #[test]
    fn config_parses_with_partial_fields() {
        let cfg: AppConfig = serde_json::from_str(r#"{"width": 80}"#).unwrap();
        assert_eq!(cfg.width, 80);
        assert_eq!(cfg.glyphs, DEFAULT_GLYPHS);
        assert!(cfg.delay.is_none());
    }

    #[test]
    fn config_default_matches_builtin() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.width, DEFAULT_WIDTH);
        assert_eq!(cfg.glyphs, DEFAULT_GLYPHS);
    }
}
