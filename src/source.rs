//! Video frame source.
//!
//! Decoding is delegated to an external `ffmpeg` process writing raw 8-bit
//! grayscale frames to stdout, with `ffprobe` supplying stream metadata up
//! front. Requires `ffmpeg` and `ffprobe` in PATH.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::error::{Error, Result};

/// Vertical squash factor compensating for glyph cells being taller than
/// wide in typical monospace rendering. Must stay at 0.55 for visual parity
/// with existing output.
pub const FONT_ASPECT: f64 = 0.55;

/// One decoded video frame reduced to a single 8-bit intensity channel,
/// row-major. Owned by whichever pipeline stage currently holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }
}

/// Ordered supply of grayscale frames.
///
/// The playback scheduler is generic over this trait so tests can drive it
/// with synthetic frames.
pub trait FrameSource {
    /// Next frame in strict source order, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<GrayFrame>>;

    /// Rewind to the first frame. Only used when loop mode is enabled.
    fn restart(&mut self) -> Result<()>;

    /// Native frame rate, 0.0 when unknown.
    fn frame_rate(&self) -> f64;

    /// Total frame count, 0 when unknown. Drives pre-load progress.
    fn frame_count(&self) -> u64 {
        0
    }
}

/// Stream metadata reported by ffprobe.
#[derive(Debug, Clone, Copy)]
struct StreamInfo {
    width: u32,
    height: u32,
    fps: f64,
    frames: u64,
}

/// Frame source backed by an `ffmpeg` subprocess.
pub struct VideoSource {
    path: PathBuf,
    info: StreamInfo,
    child: Option<Child>,
    /// First frame of the stream, read eagerly on open/restart.
    pending: Option<GrayFrame>,
}

impl VideoSource {
    /// Probe the stream, spawn the decode pipe and read the first frame.
    ///
    /// Fails with [`Error::MediaOpen`] when the path has no decodable video
    /// stream and with [`Error::EmptySource`] when the stream yields no
    /// frame at all.
    pub fn open(path: &Path) -> Result<Self> {
        let info = probe(path)?;
        let mut source = Self {
            path: path.to_path_buf(),
            info,
            child: None,
            pending: None,
        };
        source.respawn()?;
        let source = source.prime()?;
        log::info!(
            "opened {}: {}x{} @ {:.3} fps, {} frames",
            path.display(),
            info.width,
            info.height,
            info.fps,
            info.frames
        );
        Ok(source)
    }

    /// Source dimensions in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    /// Output geometry for a given character width, preserving the source
    /// aspect ratio under [`FONT_ASPECT`].
    pub fn output_geometry(&self, out_width: u32) -> (u32, u32) {
        output_geometry(self.info.width, self.info.height, out_width)
    }

    fn respawn(&mut self) -> Result<()> {
        self.release();
        let path_str = self.path.to_string_lossy();
        let child = Command::new("ffmpeg")
            .args([
                "-i",
                path_str.as_ref(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "gray",
                "-an",
                "-hide_banner",
                "-loglevel",
                "error",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::MediaOpen {
                path: self.path.clone(),
                reason: format!("cannot spawn ffmpeg: {e}"),
            })?;
        self.child = Some(child);
        Ok(())
    }

    /// Read the stream's first frame eagerly. A source that probes fine but
    /// yields no frame at all is [`Error::EmptySource`].
    fn prime(mut self) -> Result<Self> {
        self.pending = self.read_frame()?;
        if self.pending.is_none() {
            self.release();
            return Err(Error::EmptySource(self.path.clone()));
        }
        Ok(self)
    }

    fn read_frame(&mut self) -> Result<Option<GrayFrame>> {
        let (w, h) = (self.info.width, self.info.height);
        let mut buf = vec![0u8; (w * h) as usize];
        let Some(stdout) = self.child.as_mut().and_then(|c| c.stdout.as_mut()) else {
            return Ok(None);
        };
        if read_exact_or_eof(stdout, &mut buf)? {
            Ok(Some(GrayFrame::new(w, h, buf)))
        } else {
            Ok(None)
        }
    }

    /// Kill and reap the decode process. Idempotent.
    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<GrayFrame>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        let frame = self.read_frame()?;
        if frame.is_none() {
            // End of stream: reap the pipe now rather than waiting for Drop.
            self.release();
        }
        Ok(frame)
    }

    fn restart(&mut self) -> Result<()> {
        self.respawn()?;
        self.pending = self.read_frame()?;
        Ok(())
    }

    fn frame_rate(&self) -> f64 {
        self.info.fps
    }

    fn frame_count(&self) -> u64 {
        self.info.frames
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// `out_height = trunc(src_h / src_w * out_w * FONT_ASPECT)`, minimum 1.
///
/// Truncation toward zero is load-bearing: a 16:9 source at width 160 must
/// come out at exactly 49 rows.
pub fn output_geometry(src_width: u32, src_height: u32, out_width: u32) -> (u32, u32) {
    let h = (src_height as f64 / src_width as f64 * out_width as f64 * FONT_ASPECT) as u32;
    (out_width, h.max(1))
}

/// Query `ffprobe` for the primary video stream's metadata.
fn probe(path: &Path) -> Result<StreamInfo> {
    let path_str = path.to_string_lossy();
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_frames:format=duration",
            "-of",
            "default=noprint_wrappers=1",
            "-i",
            path_str.as_ref(),
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| Error::MediaOpen {
            path: path.to_path_buf(),
            reason: format!("cannot run ffprobe: {e}"),
        })?;

    if !output.status.success() {
        return Err(Error::MediaOpen {
            path: path.to_path_buf(),
            reason: "ffprobe found no readable video stream".to_string(),
        });
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let mut width = 0u32;
    let mut height = 0u32;
    let mut fps = 0.0f64;
    let mut frames = 0u64;
    let mut duration = 0.0f64;

    for line in text.lines() {
        if let Some(val) = line.strip_prefix("width=") {
            width = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("height=") {
            height = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("r_frame_rate=") {
            fps = parse_rate(val.trim());
        } else if let Some(val) = line.strip_prefix("nb_frames=") {
            frames = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("duration=") {
            duration = val.trim().parse().unwrap_or(0.0);
        }
    }

    if width == 0 || height == 0 {
        return Err(Error::MediaOpen {
            path: path.to_path_buf(),
            reason: "video stream reports zero dimensions".to_string(),
        });
    }

    // Containers without nb_frames (mkv, streams) get an estimate; 0 means
    // unknown and pre-load progress falls back to a spinner.
    if frames == 0 && fps > 0.0 && duration > 0.0 {
        frames = (duration * fps).round() as u64;
    }

    Ok(StreamInfo {
        width,
        height,
        fps,
        frames,
    })
}

/// Parse ffprobe's rational frame rate ("30000/1001", "24/1").
fn parse_rate(value: &str) -> f64 {
    let mut parts = value.splitn(2, '/');
    let num: f64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0.0);
    let den: f64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1.0);
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Read exactly `buf.len()` bytes; `Ok(false)` on EOF before completion.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut total = 0usize;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => return Ok(false),
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_truncates_sixteen_nine_at_width_160_to_49() {
        // 9/16 * 160 * 0.55 = 49.5 truncates, never rounds up
        assert_eq!(output_geometry(1920, 1080, 160), (160, 49));
        assert_eq!(output_geometry(1280, 720, 160), (160, 49));
    }

    #[test]
    fn geometry_never_collapses_to_zero_rows() {
        assert_eq!(output_geometry(4000, 10, 20), (20, 1));
    }

    #[test]
    fn geometry_square_source() {
        // 1 * 100 * 0.55 = 55
        assert_eq!(output_geometry(640, 640, 100), (100, 55));
    }

    #[test]
    fn rate_parsing() {
        assert_eq!(parse_rate("24/1"), 24.0);
        assert!((parse_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("garbage"), 0.0);
        assert_eq!(parse_rate("24/0"), 0.0);
    }

    #[test]
    fn read_exact_or_eof_handles_short_input() {
        let mut cursor = std::io::Cursor::new(vec![1u8, 2, 3]);
        let mut buf = [0u8; 4];
        assert!(!read_exact_or_eof(&mut cursor, &mut buf).unwrap());

        let mut cursor = std::io::Cursor::new(vec![1u8, 2, 3, 4]);
        assert!(read_exact_or_eof(&mut cursor, &mut buf).unwrap());
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn stream_with_no_frames_is_empty_source() {
        // No decode pipe behaves like a pipe that hit EOF before the first
        // frame: priming must report the empty stream, not succeed.
        let source = VideoSource {
            path: PathBuf::from("empty.mp4"),
            info: StreamInfo {
                width: 2,
                height: 2,
                fps: 0.0,
                frames: 0,
            },
            child: None,
            pending: None,
        };
        assert!(matches!(source.prime(), Err(Error::EmptySource(_))));
    }

    #[test]
    fn unreadable_path_is_media_open() {
        assert!(matches!(
            VideoSource::open(Path::new("/definitely/not/here.mp4")),
            Err(Error::MediaOpen { .. })
        ));
    }
}
