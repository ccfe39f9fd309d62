//! # knitkit Communication
//!
//! Talks to the knitting machine firmware: the binary protocol codec, byte
//! transports (serial port and a simulated device) and the session engine
//! that serves needle data line by line.

pub mod protocol;
pub mod session;
pub mod transport;

pub use protocol::{DeviceMessage, HostMessage, LineFlags};
pub use session::{
    spawn_session, KnitJob, LineCursor, SessionController, SessionHandle, SessionObserver,
    SessionOutcome, WorkerConfig,
};
pub use transport::{
    list_ports, ReceivedLine, SerialPortInfo, SerialTransport, SimulatedDevice,
    SimulatedDeviceConfig, Transport,
};

/// Wire line numbers a firmware requests for a job, one per pass
///
/// Covers `cycles` passes through the image starting at `start_line`; used
/// to script the simulated device. Numbers count passes from the start line
/// and wrap at 256.
pub fn request_script(
    encoder: &knitkit_pattern::LineEncoder,
    start_line: u32,
    cycles: u32,
) -> Vec<u8> {
    let first_cycle = encoder.passes_from(start_line).count() as u32;
    let passes = match cycles {
        0 => 0,
        n => first_cycle + (n - 1) * encoder.pass_count() as u32,
    };
    (start_line..start_line + passes)
        .map(|line| (line % knitkit_core::BLOCK_LENGTH) as u8)
        .collect()
}
