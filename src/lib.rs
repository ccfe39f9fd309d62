//! # knitkit
//!
//! Streams image rows to a motorized knitting machine attachment over its
//! serial line protocol.
//!
//! ## Architecture
//!
//! knitkit is organized as a workspace with multiple crates:
//!
//! 1. **knitkit-core** - Data model, session state machine, events, progress, errors
//! 2. **knitkit-pattern** - Image quantization and per-pass needle encoding
//! 3. **knitkit-communication** - Firmware protocol, serial/simulated transports, session worker
//! 4. **knitkit-settings** - TOML/JSON configuration
//! 5. **knitkit** - Command line front end that integrates all crates

pub mod app;

pub use knitkit_communication::{
    list_ports, request_script, spawn_session, DeviceMessage, HostMessage, KnitJob, LineFlags,
    SerialPortInfo, SerialTransport, SessionController, SessionHandle, SessionObserver,
    SessionOutcome, SimulatedDevice, SimulatedDeviceConfig, Transport, WorkerConfig,
};

pub use knitkit_core::{
    Alignment, DeviceStatus, Error, KnitOptions, NeedleRange, ProgressSnapshot, Result,
    SessionEvent, SessionState, StartPosition,
};

pub use knitkit_pattern::{EncodedLine, KnitImage, LineEncoder};

pub use knitkit_settings::{Config, ConnectionSettings, KnittingSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output on stderr, leaving stdout to command output
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
