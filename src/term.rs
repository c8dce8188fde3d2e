//! Terminal output sink.

use std::io::{self, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType, SetSize};
use crossterm::{execute, queue};

use crate::error::Result;

/// Destination for finished text frames.
///
/// A frame is either fully presented or not presented at all; no partial
/// frame may be left visible mid-write.
pub trait FrameSink {
    fn present(&mut self, frame: &str) -> Result<()>;
}

/// Console sink: clears the screen and writes one full text frame per cycle.
pub struct Console {
    out: io::Stdout,
}

impl Console {
    /// Size the terminal to the output geometry and hide the cursor.
    pub fn new(columns: u16, rows: u16) -> Result<Self> {
        let mut out = io::stdout();
        // Some terminals ignore SetSize; the frame still renders, just
        // scrolled, so a refusal is not an error.
        execute!(out, SetSize(columns, rows), Hide)?;
        Ok(Self { out })
    }
}

impl FrameSink for Console {
    fn present(&mut self, frame: &str) -> Result<()> {
        // Queue everything, flush once: the frame becomes visible in a
        // single write.
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0), Print(frame))?;
        self.out.flush()?;
        Ok(())
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show);
    }
}

/// In-memory sink for tests and headless use: collects every presented
/// frame in order.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub frames: Vec<String>,
}

impl FrameSink for BufferSink {
    fn present(&mut self, frame: &str) -> Result<()> {
        self.frames.push(frame.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_preserves_order() {
        let mut sink = BufferSink::default();
        sink.present("a\n").unwrap();
        sink.present("b\n").unwrap();
        assert_eq!(sink.frames, vec!["a\n", "b\n"]);
    }
}
