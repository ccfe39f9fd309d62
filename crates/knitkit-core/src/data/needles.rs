//! Needle bed geometry and image placement

use super::MACHINE_WIDTH;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Horizontal placement policy of the image inside the knit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Centered in the knit window
    #[default]
    Center,
    /// Flush with the first knit needle
    Left,
    /// Flush with the last knit needle
    Right,
    /// First image column on an explicit bed needle
    Offset(i32),
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Center => write!(f, "center"),
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Offset(needle) => write!(f, "offset {}", needle),
        }
    }
}

/// Active needle window plus the needles the image occupies
///
/// `knit_start..=knit_stop` is the window the carriage works; `img_start..=img_stop`
/// is where the image lands after applying an [`Alignment`]. The image needles are
/// only valid after [`NeedleRange::place`] and must be recomputed whenever the image
/// width, the knit window or the alignment changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNeedleRange")]
pub struct NeedleRange {
    knit_start: u8,
    knit_stop: u8,
    img_start: i32,
    img_stop: i32,
    placed_width: Option<u32>,
}

impl NeedleRange {
    /// Create an unplaced needle range
    ///
    /// Requires `0 <= start < stop < 200`.
    pub fn new(start: i32, stop: i32) -> Result<Self, ConfigurationError> {
        if start < 0 || stop >= MACHINE_WIDTH as i32 || start >= stop {
            return Err(ConfigurationError::InvalidNeedleRange { start, stop });
        }

        Ok(Self {
            knit_start: start as u8,
            knit_stop: stop as u8,
            img_start: start,
            img_stop: start - 1,
            placed_width: None,
        })
    }

    /// The full needle bed
    pub fn full_bed() -> Self {
        Self {
            knit_start: 0,
            knit_stop: (MACHINE_WIDTH - 1) as u8,
            img_start: 0,
            img_stop: -1,
            placed_width: None,
        }
    }

    /// First needle of the knit window
    pub fn knit_start(&self) -> u8 {
        self.knit_start
    }

    /// Last needle of the knit window
    pub fn knit_stop(&self) -> u8 {
        self.knit_stop
    }

    /// Number of needles in the knit window
    pub fn knit_width(&self) -> u32 {
        (self.knit_stop - self.knit_start) as u32 + 1
    }

    /// First needle of the placed image
    pub fn img_start(&self) -> i32 {
        self.img_start
    }

    /// Last needle of the placed image
    pub fn img_stop(&self) -> i32 {
        self.img_stop
    }

    /// Image width this range was last placed for
    pub fn placed_width(&self) -> Option<u32> {
        self.placed_width
    }

    /// Check whether a bed needle lies in the knit window
    pub fn in_knit_window(&self, needle: i32) -> bool {
        needle >= self.knit_start as i32 && needle <= self.knit_stop as i32
    }

    /// Check whether a bed needle is covered by the placed image
    pub fn in_image(&self, needle: i32) -> bool {
        self.placed_width.is_some() && needle >= self.img_start && needle <= self.img_stop
    }

    /// Recompute the image needles for an image width and alignment
    ///
    /// On error the range keeps its previous placement.
    pub fn place(&mut self, image_width: u32, alignment: Alignment) -> Result<(), ConfigurationError> {
        if image_width == 0 {
            return Err(ConfigurationError::InvalidImage {
                reason: "image has zero width".to_string(),
            });
        }

        let available = self.knit_width();
        if image_width > available {
            return Err(ConfigurationError::ImageTooWide {
                image_width,
                available,
            });
        }

        let width = image_width as i32;
        let knit_start = self.knit_start as i32;
        let knit_stop = self.knit_stop as i32;

        let (start, stop) = match alignment {
            Alignment::Center => {
                let start = (2 * knit_start + available as i32 - width).div_euclid(2);
                (start, start + width - 1)
            }
            Alignment::Left => (knit_start, knit_start + width - 1),
            Alignment::Right => (knit_stop - width + 1, knit_stop),
            Alignment::Offset(needle) => (needle, needle + width - 1),
        };

        if start < 0 || stop >= MACHINE_WIDTH as i32 {
            return Err(ConfigurationError::PlacementOutOfBed { start, stop });
        }

        self.img_start = start;
        self.img_stop = stop;
        self.placed_width = Some(image_width);
        Ok(())
    }

    /// Placed copy of this range
    pub fn placed(mut self, image_width: u32, alignment: Alignment) -> Result<Self, ConfigurationError> {
        self.place(image_width, alignment)?;
        Ok(self)
    }
}

// Serialized field layout, checked before it becomes a `NeedleRange`
#[derive(Deserialize)]
struct RawNeedleRange {
    knit_start: i32,
    knit_stop: i32,
    img_start: i32,
    img_stop: i32,
    placed_width: Option<u32>,
}

impl TryFrom<RawNeedleRange> for NeedleRange {
    type Error = ConfigurationError;

    fn try_from(raw: RawNeedleRange) -> Result<Self, Self::Error> {
        let mut range = Self::new(raw.knit_start, raw.knit_stop)?;
        if let Some(width) = raw.placed_width {
            range.place(width, Alignment::Offset(raw.img_start))?;
            if range.img_stop != raw.img_stop {
                return Err(ConfigurationError::PlacementOutOfBed {
                    start: raw.img_start,
                    stop: raw.img_stop,
                });
            }
        }
        Ok(range)
    }
}

impl Default for NeedleRange {
    fn default() -> Self {
        Self::full_bed()
    }
}

impl fmt::Display for NeedleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "knit {}..={}", self.knit_start, self.knit_stop)?;
        if self.placed_width.is_some() {
            write!(f, ", image {}..={}", self.img_start, self.img_stop)?;
        }
        Ok(())
    }
}
