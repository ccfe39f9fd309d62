//! # knitkit Core
//!
//! Core types, traits, and utilities for knitkit.
//! Provides the fundamental abstractions shared by the pattern encoder, the
//! device protocol and any front end: the session state machine, events,
//! progress tracking, the error taxonomy and the data model.

pub mod core;
pub mod data;
pub mod error;
pub mod progress;

pub use core::{
    event::{EventDispatcher, SessionEvent},
    state::{transition, Trigger},
};

pub use data::{
    Alignment, Carriage, DeviceStatus, KnitOptions, NeedleRange, ProgressSnapshot, SessionState,
    StartPosition, BLOCK_LENGTH, LINE_BYTES, MACHINE_WIDTH, MAX_COLORS, PROTOCOL_API_VERSION,
};

pub use error::{
    ConfigurationError, DeviceRejection, Error, ProgressError, ProtocolViolation, Result,
    SessionError, TransportError,
};

pub use progress::ProgressTracker;
