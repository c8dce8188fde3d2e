//! Audio companion.
//!
//! Extracts the source's audio track to a temporary mono 44.1 kHz s16 WAV
//! with `ffmpeg` and plays it with `ffplay`, on a detached thread. Entirely
//! best-effort: every failure is logged and swallowed, video playback is
//! never affected. Audio and video share no state beyond starting at
//! roughly the same instant; drift after a loop restart is accepted.

use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Handle to a running companion. Dropping it detaches the playback; callers
/// wanting tighter audio/video coupling can [`join`](AudioHandle::join).
pub struct AudioHandle {
    thread: JoinHandle<()>,
}

impl AudioHandle {
    /// Block until audio playback finishes (or fails).
    pub fn join(self) {
        let _ = self.thread.join();
    }
}

/// Start extract-and-play for `path` on a detached thread.
///
/// Returns `None` when even the thread could not be spawned; in every other
/// failure mode the thread logs and exits quietly.
pub fn spawn(path: &Path) -> Option<AudioHandle> {
    let path = path.to_path_buf();
    match thread::Builder::new()
        .name("tascii-audio".to_string())
        .spawn(move || {
            if let Err(e) = extract_and_play(&path) {
                log::warn!("audio companion: {e}; continuing without audio");
            }
        }) {
        Ok(thread) => Some(AudioHandle { thread }),
        Err(e) => {
            log::warn!("audio companion: cannot spawn thread: {e}");
            None
        }
    }
}

fn extract_and_play(path: &Path) -> Result<()> {
    let wav = extract_track(path)?;
    log::info!("audio track extracted to {}", wav.path().display());
    play_track(wav.path())?;
    // NamedTempFile drops here, deleting the extracted track once ffplay
    // has exited.
    Ok(())
}

/// Run ffmpeg to pull a mono 44.1 kHz pcm_s16le track into a temp WAV.
fn extract_track(path: &Path) -> Result<NamedTempFile> {
    let wav = tempfile::Builder::new()
        .prefix("tascii-audio-")
        .suffix(".wav")
        .tempfile()
        .map_err(|e| Error::AudioExtraction(format!("cannot create temp file: {e}")))?;

    let status = Command::new("ffmpeg")
        .args([
            "-y",
            "-i",
            path.to_string_lossy().as_ref(),
            "-vn",
            "-ar",
            "44100",
            "-ac",
            "1",
            "-c:a",
            "pcm_s16le",
            "-hide_banner",
            "-loglevel",
            "error",
            wav.path().to_string_lossy().as_ref(),
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| Error::AudioExtraction(format!("cannot run ffmpeg: {e}")))?;

    if !status.success() {
        return Err(Error::AudioExtraction(format!(
            "ffmpeg could not extract a track from {}",
            path.display()
        )));
    }
    Ok(wav)
}

/// Play the extracted track with ffplay and wait for it to finish.
fn play_track(wav: &Path) -> Result<()> {
    let status = Command::new("ffplay")
        .args([
            "-nodisp",
            "-autoexit",
            "-hide_banner",
            "-loglevel",
            "error",
            wav.to_string_lossy().as_ref(),
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| Error::AudioExtraction(format!("cannot run ffplay: {e}")))?;

    if !status.success() {
        return Err(Error::AudioExtraction("ffplay exited with failure".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Failures must never escape the companion thread.
    #[test]
    fn unreadable_source_is_swallowed() {
        let handle = spawn(Path::new("/definitely/not/here.mp4"));
        if let Some(h) = handle {
            h.join();
        }
    }
}
