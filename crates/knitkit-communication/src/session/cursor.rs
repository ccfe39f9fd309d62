//! Line cursor over the pass sequence
//!
//! Wire line numbers count passes, not image rows: a row with three colors
//! takes three consecutive numbers. The cursor keeps the absolute pass
//! number, which starts at the configured start line and only ever grows, so
//! the 256-line block derives from it. Row, color and repeat count are
//! tracked alongside.

use knitkit_core::{StartPosition, BLOCK_LENGTH};
use knitkit_pattern::LineEncoder;

/// Position of the next pass to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCursor {
    line: u32,
    row: u32,
    color: u8,
    repeats: u32,
}

impl LineCursor {
    /// Arm a cursor on the first pass of the start line
    pub fn start(encoder: &LineEncoder, start: StartPosition) -> Option<Self> {
        let (row, color) = encoder.first_pass(start.start_line())?;
        Some(Self {
            line: start.start_line(),
            row,
            color,
            repeats: 0,
        })
    }

    /// Absolute pass number
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Color of the pending pass
    pub fn color(&self) -> u8 {
        self.color
    }

    /// Image row of the pending pass
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Completed repetitions of the image
    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    /// Number of 256-line wraps behind the current pass
    pub fn block(&self) -> u32 {
        self.line / BLOCK_LENGTH
    }

    /// Wire line number the firmware is expected to request
    pub fn wire_line(&self) -> u8 {
        (self.line % BLOCK_LENGTH) as u8
    }

    /// Absolute pass a wire number refers to within the current block
    pub fn resolve(&self, wire_line: u8) -> u32 {
        self.block() * BLOCK_LENGTH + wire_line as u32
    }

    /// Move to the next pass
    ///
    /// Returns `false` once the image is exhausted; with `repeat` the cursor
    /// wraps to the first row instead.
    pub fn advance(&mut self, encoder: &LineEncoder, repeat: bool) -> bool {
        let next = match encoder.next_pass(self.row, self.color) {
            Some(pass) => pass,
            None if repeat => match encoder.first_pass(0) {
                Some(pass) => {
                    self.repeats += 1;
                    pass
                }
                None => return false,
            },
            None => return false,
        };

        self.line += 1;
        (self.row, self.color) = next;
        true
    }
}
