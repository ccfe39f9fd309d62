//! Data models for a knitting session
//!
//! This module provides:
//! - Needle bed geometry and image placement
//! - Start position with 256-line block bookkeeping
//! - Session state and progress snapshots
//! - Knitting options supplied by the configuration source
//! - Device status reported by the firmware

pub mod needles;

pub use needles::{Alignment, NeedleRange};

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of needles on the machine bed
pub const MACHINE_WIDTH: usize = 200;

/// Number of bytes carrying one bed-wide line on the wire
pub const LINE_BYTES: usize = MACHINE_WIDTH / 8;

/// Lines per block; the wire line number is a single byte
pub const BLOCK_LENGTH: u32 = 256;

/// Largest supported color count
pub const MAX_COLORS: u8 = 6;

/// Firmware API version spoken by this host
pub const PROTOCOL_API_VERSION: u8 = 0x05;

/// Logical start of knitting
///
/// `start_block` counts the 256-line wraps preceding `start_line`; the
/// firmware's first line number is `start_line % 256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StartPosition {
    start_line: u32,
    start_block: u32,
}

impl StartPosition {
    /// Create a start position for an absolute image row
    pub fn new(start_line: u32) -> Self {
        Self {
            start_line,
            start_block: start_line / BLOCK_LENGTH,
        }
    }

    /// Absolute image row knitting starts at
    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    /// Number of 256-line wraps before the start line
    pub fn start_block(&self) -> u32 {
        self.start_block
    }

    /// Line number the firmware uses for the start line
    pub fn wire_line(&self) -> u8 {
        (self.start_line % BLOCK_LENGTH) as u8
    }

    /// Check that the start line is a row of an image of `height` rows
    pub fn validate(&self, height: u32) -> Result<(), ConfigurationError> {
        if self.start_line >= height {
            return Err(ConfigurationError::InvalidStartLine {
                start_line: self.start_line,
                height,
            });
        }
        Ok(())
    }

    /// Move the start line, leaving the position unchanged when it is out of range
    pub fn set_start_line(&mut self, start_line: u32, height: u32) -> Result<(), ConfigurationError> {
        let candidate = Self::new(start_line);
        candidate.validate(height)?;
        *self = candidate;
        Ok(())
    }
}

/// Knitting session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// Fresh controller, nothing configured
    #[default]
    Activated,
    /// A job is configured and validated
    Configured,
    /// Lines are being served to the device
    Knitting,
    /// The last line was sent
    Finished,
    /// The session failed
    Error,
}

impl SessionState {
    /// Check whether the session ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activated => write!(f, "Activated"),
            Self::Configured => write!(f, "Configured"),
            Self::Knitting => write!(f, "Knitting"),
            Self::Finished => write!(f, "Finished"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Row-by-row progress of a session
///
/// All fields are `-1` while no image is being knitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Image row of the last served line
    pub row: i32,
    /// Number of rows in the image
    pub total: i32,
    /// Completed repetitions of the image
    pub repeats: i32,
    /// Color index of the last served line
    pub color: i32,
}

impl ProgressSnapshot {
    /// The "no image" snapshot
    pub const NONE: Self = Self {
        row: -1,
        total: -1,
        repeats: -1,
        color: -1,
    };

    /// Check whether the snapshot describes an image
    pub fn is_active(&self) -> bool {
        self.row >= 0
    }
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_active() {
            return write!(f, "idle");
        }
        write!(
            f,
            "row {}/{} color {} repeat {}",
            self.row + 1,
            self.total,
            self.color,
            self.repeats
        )
    }
}

/// Options supplied together with the image and needle range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnitOptions {
    /// Placement of the image in the knit window
    pub alignment: Alignment,
    /// Ask the firmware for asynchronous status indications
    pub continuous_reporting: bool,
    /// Restart the image instead of finishing
    pub infinite_repeat: bool,
    /// Required firmware API version, if checked
    pub expected_api_version: Option<u8>,
}

impl Default for KnitOptions {
    fn default() -> Self {
        Self {
            alignment: Alignment::Center,
            continuous_reporting: false,
            infinite_repeat: false,
            expected_api_version: None,
        }
    }
}

/// Carriage detected by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Carriage {
    /// Knit carriage
    Knit,
    /// Lace carriage
    Lace,
    /// Garter carriage
    Garter,
    /// Nothing detected yet
    #[default]
    Unknown,
}

impl Carriage {
    /// Decode the firmware's carriage byte
    pub fn from_byte(value: u8) -> Self {
        match value {
            1 => Self::Knit,
            2 => Self::Lace,
            3 => Self::Garter,
            _ => Self::Unknown,
        }
    }

    /// Firmware byte for this carriage
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Knit => 1,
            Self::Lace => 2,
            Self::Garter => 3,
            Self::Unknown => 0,
        }
    }
}

impl fmt::Display for Carriage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Knit => write!(f, "K carriage"),
            Self::Lace => write!(f, "L carriage"),
            Self::Garter => write!(f, "G carriage"),
            Self::Unknown => write!(f, "no carriage"),
        }
    }
}

/// Status indication sent by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Firmware is ready to knit
    pub ready: bool,
    /// Left hall sensor reading
    pub hall_left: u16,
    /// Right hall sensor reading
    pub hall_right: u16,
    /// Detected carriage
    pub carriage: Carriage,
    /// Carriage position in needles
    pub carriage_position: u8,
}
