//! Error handling for knitkit
//!
//! Provides error types for all layers of a knitting session:
//! - Configuration errors (needle range, image placement, start line)
//! - Transport errors (serial port open/read/write, timeouts)
//! - Protocol violations (malformed frames, out-of-order line requests)
//! - Device rejections (start refused, firmware API mismatch)
//! - Session errors (state machine misuse)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Configuration error type
///
/// Reported synchronously from `configure`; never fatal to a prior session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Knit window is empty, reversed or outside the needle bed
    #[error("Invalid needle range {start}..={stop}")]
    InvalidNeedleRange {
        /// Requested first needle.
        start: i32,
        /// Requested last needle.
        stop: i32,
    },

    /// Image does not fit into the active needle window
    #[error("Image width {image_width} exceeds the {available} needles of the knit range")]
    ImageTooWide {
        /// Width of the image in stitches.
        image_width: u32,
        /// Number of needles in the knit range.
        available: u32,
    },

    /// Image placement falls off the needle bed
    #[error("Image placement {start}..={stop} is outside the needle bed")]
    PlacementOutOfBed {
        /// Computed first image needle.
        start: i32,
        /// Computed last image needle.
        stop: i32,
    },

    /// Needle range was placed for a different image width
    #[error("Needle range placed for width {placed_width}, image is {image_width} wide")]
    StalePlacement {
        /// Width the range was last placed for.
        placed_width: u32,
        /// Width of the image being encoded.
        image_width: u32,
    },

    /// Start line is not a row of the image
    #[error("Start line {start_line} is outside the image height {height}")]
    InvalidStartLine {
        /// Requested start line.
        start_line: u32,
        /// Height of the image.
        height: u32,
    },

    /// Unsupported number of colors
    #[error("Unsupported color count {num_colors}")]
    InvalidColorCount {
        /// Requested color count.
        num_colors: u8,
    },

    /// A pixel carries a color index outside the palette
    #[error("Color {color} at ({x}, {y}) is out of range for {num_colors} colors")]
    ColorOutOfRange {
        /// Column of the pixel.
        x: u32,
        /// Row of the pixel.
        y: u32,
        /// Offending color index.
        color: u8,
        /// Palette size.
        num_colors: u8,
    },

    /// Image data is unusable
    #[error("Invalid image: {reason}")]
    InvalidImage {
        /// The reason the image was rejected.
        reason: String,
    },
}

/// Transport error type
///
/// Fatal to the current session; the transport is assumed dead afterwards.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Operation requires an open port
    #[error("Transport is not open")]
    NotOpen,

    /// Write failed
    #[error("Write failed: {reason}")]
    WriteFailed {
        /// The reason for the write failure.
        reason: String,
    },

    /// Read failed
    #[error("Read failed: {reason}")]
    ReadFailed {
        /// The reason for the read failure.
        reason: String,
    },

    /// Device stayed silent for too long
    #[error("No response from device after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },
}

/// Protocol violation type
///
/// Fatal to the current session; logged with the offending raw bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Leading byte does not name a known message
    #[error("Unknown message id 0x{id:02X} in [{raw}]")]
    UnknownMessageId {
        /// The unrecognized id byte.
        id: u8,
        /// Hex dump of the received window.
        raw: String,
    },

    /// Frame is shorter than its message kind requires
    #[error("Truncated frame for message 0x{id:02X}: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Message id of the frame.
        id: u8,
        /// Required length.
        expected: usize,
        /// Received length.
        actual: usize,
    },

    /// Host frame is not followed by the frame terminator
    #[error("Missing frame terminator after message 0x{id:02X}")]
    MissingTerminator {
        /// Message id of the frame.
        id: u8,
    },

    /// CRC-8 does not match the frame body
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch {
        /// CRC computed over the body.
        expected: u8,
        /// CRC carried by the frame.
        actual: u8,
    },

    /// Device requested a line other than the next pending one
    #[error("Line request {received} does not match expected line {expected}")]
    UnexpectedLine {
        /// Wire line number the controller expected.
        expected: u8,
        /// Wire line number the device requested.
        received: u8,
    },

    /// Device requested a line although the sequence is exhausted
    #[error("Line request {received} after the last line was sent")]
    SequenceExhausted {
        /// Wire line number the device requested.
        received: u8,
    },
}

/// Device rejection type
///
/// The firmware answered, but refused to proceed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceRejection {
    /// `cnfStart` reported failure
    #[error("Device rejected the start request")]
    StartRejected,

    /// Firmware speaks a different protocol version
    #[error("Firmware API version {actual} does not match expected version {expected}")]
    ApiVersionMismatch {
        /// The version the host speaks.
        expected: u8,
        /// The version the firmware reported.
        actual: u8,
    },
}

/// Session error type
///
/// Misuse of the session state machine by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Invalid state transition
    #[error("Invalid state transition from {current} on {trigger}")]
    InvalidStateTransition {
        /// The current state name.
        current: String,
        /// The rejected trigger name.
        trigger: String,
    },

    /// Operation requires a configured job
    #[error("Session is not configured")]
    NotConfigured,
}

/// Progress update error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    /// Row must be non-negative
    #[error("Invalid progress row {row}")]
    NegativeRow {
        /// The rejected row.
        row: i32,
    },
}

/// Main error type for knitkit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Protocol violation
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    /// Device rejection
    #[error(transparent)]
    Device(#[from] DeviceRejection),

    /// Session error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Progress error
    #[error(transparent)]
    Progress(#[from] ProgressError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this error ends a running session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Protocol(_) | Error::Device(_) | Error::Io(_)
        )
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(TransportError::Timeout { .. }))
    }

    /// Check if this is a configuration error
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Check if this is a protocol violation
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
