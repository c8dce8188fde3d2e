//! Playback scheduling.
//!
//! One thread drives source → mapper → sink. The CPU strategy streams
//! (convert, present, pace, repeat); the accelerator strategy pre-loads the
//! whole sequence before the first present. Cancellation is cooperative and
//! checked before every present, so a run never leaves a partial frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::audio;
use crate::error::Result;
use crate::mapper::{self, FrameMapper, PlayMode};
use crate::palette::GlyphPalette;
use crate::source::{FrameSource, VideoSource};
use crate::term::{Console, FrameSink};
use crate::PlaybackJob;

/// Fallback per-frame delay when neither the job nor the source provides one.
pub const DEFAULT_DELAY_SECS: f64 = 0.025;

/// Shared cancellation flag, set from a ctrl-c handler (or any other
/// caller) and polled once per frame iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-frame interval: explicit job delay wins, then the source's native
/// rate, then [`DEFAULT_DELAY_SECS`].
pub fn frame_interval(explicit: Option<f64>, native_fps: f64) -> Duration {
    let secs = match explicit {
        Some(d) if d > 0.0 => d,
        _ if native_fps > 0.0 => 1.0 / native_fps,
        _ => DEFAULT_DELAY_SECS,
    };
    Duration::from_secs_f64(secs)
}

/// Run one playback job to completion (or cancellation).
///
/// `progress` receives `(loaded, total)` during pre-load; `total` is 0 when
/// the source cannot report a frame count.
pub fn play<F>(job: &PlaybackJob, cancel: &CancelFlag, progress: F) -> Result<()>
where
    F: Fn(u64, u64),
{
    let mut source = VideoSource::open(&job.source)?;
    let (out_w, out_h) = source.output_geometry(job.width);
    let (mapper, mode) = mapper::select(job.device.as_deref(), out_w, out_h);
    let interval = frame_interval(job.delay, source.frame_rate());
    log::info!(
        "playing {} at {}x{} via {} strategy, {:.1} ms/frame",
        job.source.display(),
        out_w,
        out_h,
        mapper.label(),
        interval.as_secs_f64() * 1000.0
    );

    let mut sink = Console::new(clamp_dim(out_w), clamp_dim(out_h))?;

    match mode {
        PlayMode::Streaming => {
            let _audio = if job.audio {
                audio::spawn(&job.source)
            } else {
                None
            };
            run_streaming(
                &mut source,
                mapper.as_ref(),
                &job.palette,
                &mut sink,
                interval,
                job.looping,
                cancel,
            )?;
        }
        PlayMode::Preload => {
            let frames = preload(&mut source, mapper.as_ref(), &job.palette, cancel, &progress)?;
            drop(source);
            if cancel.is_cancelled() || frames.is_empty() {
                return Ok(());
            }
            let _audio = if job.audio {
                audio::spawn(&job.source)
            } else {
                None
            };
            run_preloaded(&frames, &mut sink, interval, job.looping, cancel)?;
        }
    }
    Ok(())
}

/// Streaming mode: convert each frame as it arrives and present it paced.
///
/// Returns the number of frames presented. With `looping` the source is
/// restarted at end of stream and the run only ends on cancellation.
pub fn run_streaming<S, K>(
    source: &mut S,
    mapper: &dyn FrameMapper,
    palette: &GlyphPalette,
    sink: &mut K,
    interval: Duration,
    looping: bool,
    cancel: &CancelFlag,
) -> Result<u64>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    let mut emitted = 0u64;
    let mut next_due: Option<Instant> = None;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let frame = match source.next_frame()? {
            Some(frame) => frame,
            None if looping && emitted > 0 => {
                source.restart()?;
                match source.next_frame()? {
                    Some(frame) => frame,
                    // A source that comes back empty after restart would
                    // otherwise spin forever.
                    None => break,
                }
            }
            None => break,
        };
        let text = mapper.map(&frame, palette)?;
        pace(&mut next_due, interval);
        if cancel.is_cancelled() {
            break;
        }
        sink.present(&text)?;
        emitted += 1;
    }
    Ok(emitted)
}

/// Pre-load mode, phase one: convert every frame up front.
///
/// Stops early (returning the frames mapped so far) when cancelled.
pub fn preload<S, F>(
    source: &mut S,
    mapper: &dyn FrameMapper,
    palette: &GlyphPalette,
    cancel: &CancelFlag,
    progress: &F,
) -> Result<Vec<String>>
where
    S: FrameSource + ?Sized,
    F: Fn(u64, u64),
{
    let total = source.frame_count();
    let mut frames = Vec::with_capacity(total as usize);
    while let Some(frame) = source.next_frame()? {
        if cancel.is_cancelled() {
            break;
        }
        frames.push(mapper.map(&frame, palette)?);
        progress(frames.len() as u64, total);
    }
    Ok(frames)
}

/// Pre-load mode, phase two: replay the buffered sequence at the paced
/// interval. Looping replays the buffer indefinitely without re-decoding.
pub fn run_preloaded<K>(
    frames: &[String],
    sink: &mut K,
    interval: Duration,
    looping: bool,
    cancel: &CancelFlag,
) -> Result<u64>
where
    K: FrameSink + ?Sized,
{
    let mut emitted = 0u64;
    let mut next_due: Option<Instant> = None;

    'replay: loop {
        for text in frames {
            pace(&mut next_due, interval);
            if cancel.is_cancelled() {
                break 'replay;
            }
            sink.present(text)?;
            emitted += 1;
        }
        if !looping || frames.is_empty() {
            break;
        }
    }
    Ok(emitted)
}

/// Sleep out the remainder of the previous frame's interval, then arm the
/// next deadline. The first frame of a run is presented immediately.
fn pace(next_due: &mut Option<Instant>, interval: Duration) {
    if let Some(due) = *next_due {
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
    }
    *next_due = Some(Instant::now() + interval);
}

fn clamp_dim(value: u32) -> u16 {
    value.min(u16::MAX as u32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::CpuMapper;
    use crate::source::GrayFrame;
    use crate::term::BufferSink;

    struct TestSource {
        frames: Vec<GrayFrame>,
        pos: usize,
        restarts: usize,
    }

    impl TestSource {
        fn with_frames(count: usize) -> Self {
            let frames = (0..count)
                .map(|i| GrayFrame::new(2, 2, vec![(i * 40) as u8; 4]))
                .collect();
            Self {
                frames,
                pos: 0,
                restarts: 0,
            }
        }
    }

    impl FrameSource for TestSource {
        fn next_frame(&mut self) -> Result<Option<GrayFrame>> {
            let frame = self.frames.get(self.pos).cloned();
            if frame.is_some() {
                self.pos += 1;
            }
            Ok(frame)
        }

        fn restart(&mut self) -> Result<()> {
            self.pos = 0;
            self.restarts += 1;
            Ok(())
        }

        fn frame_rate(&self) -> f64 {
            0.0
        }

        fn frame_count(&self) -> u64 {
            self.frames.len() as u64
        }
    }

    /// Sink that flips the cancel flag once a quota of frames has landed.
    struct CancellingSink {
        inner: BufferSink,
        cancel: CancelFlag,
        after: usize,
    }

    impl FrameSink for CancellingSink {
        fn present(&mut self, frame: &str) -> Result<()> {
            self.inner.present(frame)?;
            if self.inner.frames.len() >= self.after {
                self.cancel.cancel();
            }
            Ok(())
        }
    }

    fn test_mapper() -> CpuMapper {
        CpuMapper::new(2, 2)
    }

    #[test]
    fn one_frame_source_presents_exactly_once() {
        let mut source = TestSource::with_frames(1);
        let mut sink = BufferSink::default();
        let emitted = run_streaming(
            &mut source,
            &test_mapper(),
            &GlyphPalette::default(),
            &mut sink,
            Duration::ZERO,
            false,
            &CancelFlag::new(),
        )
        .unwrap();
        assert_eq!(emitted, 1);
        assert_eq!(sink.frames.len(), 1);
        assert_eq!(source.restarts, 0);
    }

    #[test]
    fn streaming_emits_each_frame_once_without_loop() {
        let mut source = TestSource::with_frames(3);
        let mut sink = BufferSink::default();
        let emitted = run_streaming(
            &mut source,
            &test_mapper(),
            &GlyphPalette::default(),
            &mut sink,
            Duration::ZERO,
            false,
            &CancelFlag::new(),
        )
        .unwrap();
        assert_eq!(emitted, 3);
    }

    #[test]
    fn loop_cancelled_after_seven_presents_exactly_seven() {
        let cancel = CancelFlag::new();
        let mut source = TestSource::with_frames(3);
        let mut sink = CancellingSink {
            inner: BufferSink::default(),
            cancel: cancel.clone(),
            after: 7,
        };
        let emitted = run_streaming(
            &mut source,
            &test_mapper(),
            &GlyphPalette::default(),
            &mut sink,
            Duration::ZERO,
            true,
            &cancel,
        )
        .unwrap();
        // two full passes of three plus one: never a partial frame
        assert_eq!(emitted, 7);
        assert_eq!(sink.inner.frames.len(), 7);
        assert_eq!(source.restarts, 2);
    }

    #[test]
    fn cancelled_before_start_presents_nothing() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut source = TestSource::with_frames(3);
        let mut sink = BufferSink::default();
        let emitted = run_streaming(
            &mut source,
            &test_mapper(),
            &GlyphPalette::default(),
            &mut sink,
            Duration::ZERO,
            false,
            &cancel,
        )
        .unwrap();
        assert_eq!(emitted, 0);
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn preload_reports_progress_and_keeps_order() {
        let mut source = TestSource::with_frames(3);
        let seen = std::sync::Mutex::new(Vec::new());
        let frames = preload(
            &mut source,
            &test_mapper(),
            &GlyphPalette::default(),
            &CancelFlag::new(),
            &|current, total| seen.lock().unwrap().push((current, total)),
        )
        .unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
        // frames differ because intensities differ
        assert_ne!(frames[0], frames[2]);
    }

    #[test]
    fn preloaded_replay_without_loop_presents_each_once() {
        let frames = vec!["a\n".to_string(), "b\n".to_string()];
        let mut sink = BufferSink::default();
        let emitted = run_preloaded(
            &frames,
            &mut sink,
            Duration::ZERO,
            false,
            &CancelFlag::new(),
        )
        .unwrap();
        assert_eq!(emitted, 2);
        assert_eq!(sink.frames, frames);
    }

    #[test]
    fn preloaded_loop_replays_buffer_until_cancelled() {
        let cancel = CancelFlag::new();
        let frames = vec!["a\n".to_string(), "b\n".to_string()];
        let mut sink = CancellingSink {
            inner: BufferSink::default(),
            cancel: cancel.clone(),
            after: 5,
        };
        let emitted = run_preloaded(&frames, &mut sink, Duration::ZERO, true, &cancel).unwrap();
        assert_eq!(emitted, 5);
        assert_eq!(sink.inner.frames[4], "a\n");
    }

    #[test]
    fn interval_resolution_order() {
        assert_eq!(
            frame_interval(Some(0.1), 30.0),
            Duration::from_secs_f64(0.1)
        );
        assert_eq!(
            frame_interval(None, 25.0),
            Duration::from_secs_f64(1.0 / 25.0)
        );
        assert_eq!(
            frame_interval(None, 0.0),
            Duration::from_secs_f64(DEFAULT_DELAY_SECS)
        );
        // non-positive explicit delay falls through to the native rate
        assert_eq!(
            frame_interval(Some(0.0), 20.0),
            Duration::from_secs_f64(1.0 / 20.0)
        );
    }
}
