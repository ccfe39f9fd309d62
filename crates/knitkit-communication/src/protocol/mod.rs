//! Binary protocol spoken with the knitting firmware
//!
//! Stateless message (de)serialization, fixed-length framing and the CRC-8
//! carried by line frames.

pub mod crc;
pub mod framing;
pub mod messages;

pub use crc::crc8;
pub use framing::{decode_frame, decode_host_frame, hex_dump, separator_len};
pub use messages::{ids, DeviceMessage, HostMessage, LineFlags, FRAME_TERMINATOR};
