use crate::error::{Error, Result};

/// Default dark-to-light glyph ramp.
pub const DEFAULT_GLYPHS: &str = " .:-=+*+#%@";

/// An ordered set of glyphs used to represent pixel brightness.
///
/// Index 0 is the darkest glyph, the last index the brightest. The palette is
/// immutable for the duration of one playback job.
///
/// # Example
///
/// ```
/// use tascii::GlyphPalette;
///
/// let palette = GlyphPalette::new(" .:@").unwrap();
/// assert_eq!(palette.glyph_for(0), ' ');
/// assert_eq!(palette.glyph_for(255), '@');
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphPalette {
    glyphs: Vec<char>,
}

impl GlyphPalette {
    /// Build a palette from a dark-to-light character ramp.
    ///
    /// A single-glyph ramp is degenerate but accepted (every pixel maps to
    /// that glyph); an empty ramp is an error.
    pub fn new(ramp: &str) -> Result<Self> {
        let glyphs: Vec<char> = ramp.chars().collect();
        if glyphs.is_empty() {
            return Err(Error::EmptyPalette);
        }
        Ok(Self { glyphs })
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Map an 8-bit intensity to a palette index.
    ///
    /// `index = intensity * len / 256`, clamped to `len - 1` so that
    /// intensity 255 can never step past the ramp.
    #[inline]
    pub fn index_for(&self, intensity: u8) -> usize {
        let idx = intensity as usize * self.glyphs.len() / 256;
        idx.min(self.glyphs.len() - 1)
    }

    /// Map an 8-bit intensity straight to its glyph.
    #[inline]
    pub fn glyph_for(&self, intensity: u8) -> char {
        self.glyphs[self.index_for(intensity)]
    }

    /// Glyph at a precomputed palette index, clamped to the ramp.
    #[inline]
    pub fn glyph_at(&self, index: usize) -> char {
        self.glyphs[index.min(self.glyphs.len() - 1)]
    }
}

impl Default for GlyphPalette {
    fn default() -> Self {
        Self {
            glyphs: DEFAULT_GLYPHS.chars().collect(),
        }
    }
}
