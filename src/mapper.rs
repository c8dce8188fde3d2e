//! Frame conversion strategies.
//!
//! Two interchangeable implementations sit behind [`FrameMapper`]: a
//! rayon-parallel CPU path and a wgpu compute path (see [`crate::gpu`]).
//! Both share the same host-side resize and glyph rendering, so identical
//! inputs always produce byte-identical text frames.

use image::imageops::FilterType;
use rayon::prelude::*;

use crate::device;
use crate::error::{Error, Result};
use crate::gpu::GpuMapper;
use crate::palette::GlyphPalette;
use crate::source::GrayFrame;

/// How the scheduler should drive playback for a chosen strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    /// Convert and display one frame at a time (CPU strategy).
    Streaming,
    /// Convert everything up front, then replay (accelerator strategy).
    Preload,
}

/// Converts one grayscale frame into one text frame.
pub trait FrameMapper: Send {
    fn map(&self, frame: &GrayFrame, palette: &GlyphPalette) -> Result<String>;

    /// Short strategy name for logs.
    fn label(&self) -> &'static str;
}

/// Bilinear resize to the output geometry. Bilinear matches the original
/// pipeline; changing the filter changes every emitted frame.
pub(crate) fn resize_frame(frame: &GrayFrame, out_width: u32, out_height: u32) -> Result<GrayFrame> {
    if frame.width == out_width && frame.height == out_height {
        return Ok(frame.clone());
    }
    let img = image::GrayImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "frame buffer does not match its dimensions",
            ))
        })?;
    let resized = image::imageops::resize(&img, out_width, out_height, FilterType::Triangle);
    Ok(GrayFrame::new(out_width, out_height, resized.into_raw()))
}

/// Turn a buffer of palette indices into glyph rows. Shared by both
/// strategies so the row-break layout can never diverge.
pub(crate) fn render_indices(indices: &[u32], width: usize, palette: &GlyphPalette) -> String {
    let mut out = String::with_capacity(indices.len() + indices.len() / width.max(1));
    for row in indices.chunks(width) {
        for &idx in row {
            out.push(palette.glyph_at(idx as usize));
        }
        out.push('\n');
    }
    out
}

/// CPU strategy: resize, then row-parallel palette lookup.
pub struct CpuMapper {
    out_width: u32,
    out_height: u32,
}

impl CpuMapper {
    pub fn new(out_width: u32, out_height: u32) -> Self {
        Self {
            out_width,
            out_height,
        }
    }
}

impl FrameMapper for CpuMapper {
    fn map(&self, frame: &GrayFrame, palette: &GlyphPalette) -> Result<String> {
        let resized = resize_frame(frame, self.out_width, self.out_height)?;
        let width = resized.width as usize;
        let rows: Vec<String> = resized
            .data
            .par_chunks(width)
            .map(|row| {
                let mut line = String::with_capacity(width + 1);
                for &px in row {
                    line.push(palette.glyph_for(px));
                }
                line.push('\n');
                line
            })
            .collect();
        Ok(rows.concat())
    }

    fn label(&self) -> &'static str {
        "cpu"
    }
}

/// Pick the conversion strategy for a job.
///
/// The accelerator path is used only when the selector names a device, the
/// catalog has a matching adapter, and device setup succeeds. Any failure
/// logs one warning and falls back to the CPU path; device trouble is never
/// fatal to a job.
pub fn select(
    selector: Option<&str>,
    out_width: u32,
    out_height: u32,
) -> (Box<dyn FrameMapper>, PlayMode) {
    if device::selects_cpu(selector) {
        return (
            Box::new(CpuMapper::new(out_width, out_height)),
            PlayMode::Streaming,
        );
    }
    let selector = selector.unwrap_or_default();
    match GpuMapper::new(selector, out_width, out_height) {
        Ok(gpu) => {
            log::info!("using accelerator strategy on '{}'", gpu.adapter_name());
            (Box::new(gpu), PlayMode::Preload)
        }
        Err(e) => {
            log::warn!("{e}; falling back to CPU conversion");
            (
                Box::new(CpuMapper::new(out_width, out_height)),
                PlayMode::Streaming,
            )
        }
    }
}
