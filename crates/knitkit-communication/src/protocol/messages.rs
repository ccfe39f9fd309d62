//! Message set exchanged with the knitting firmware
//!
//! Every frame starts with a one-byte id and has a fixed length for its kind.
//! Host frames are followed by [`FRAME_TERMINATOR`]; device frames are not
//! terminated, but the firmware may pad them with line breaks.

use super::crc::crc8;
use bitflags::bitflags;
use knitkit_core::{Carriage, DeviceStatus, LINE_BYTES};
use std::fmt;

/// Trailer after every host frame
pub const FRAME_TERMINATOR: [u8; 2] = *b"\n\r";

/// Message ids
pub mod ids {
    /// Host asks the firmware to start knitting
    pub const REQ_START: u8 = 0x01;
    /// Host asks for the firmware API version
    pub const REQ_INFO: u8 = 0x03;
    /// Host asks for a hardware self test
    pub const REQ_TEST: u8 = 0x04;
    /// Host answers a line request
    pub const CNF_LINE: u8 = 0x42;
    /// Firmware answers a start request
    pub const CNF_START: u8 = 0xC1;
    /// Firmware answers an info request
    pub const CNF_INFO: u8 = 0xC3;
    /// Firmware answers a test request
    pub const CNF_TEST: u8 = 0xC4;
    /// Firmware requests a line
    pub const REQ_LINE: u8 = 0x82;
    /// Firmware status indication
    pub const IND_STATE: u8 = 0x84;
}

bitflags! {
    /// Flags byte of a `cnfLine` frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LineFlags: u8 {
        /// No further line follows
        const LAST_LINE = 0x01;
    }
}

/// Messages sent by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMessage {
    /// Start knitting on a needle window
    ReqStart {
        /// First needle of the knit window.
        start_needle: u8,
        /// Last needle of the knit window.
        stop_needle: u8,
        /// Ask for asynchronous `indState` reports.
        continuous_reporting: bool,
    },
    /// Ask for the firmware API version
    ReqInfo,
    /// Ask for a hardware self test
    ReqTest,
    /// Needle data for a requested line
    CnfLine {
        /// Wire line number being answered.
        line_number: u8,
        /// Full-bed needle bits.
        data: [u8; LINE_BYTES],
        /// Line flags.
        flags: LineFlags,
    },
}

impl HostMessage {
    /// Message id
    pub fn id(&self) -> u8 {
        match self {
            Self::ReqStart { .. } => ids::REQ_START,
            Self::ReqInfo => ids::REQ_INFO,
            Self::ReqTest => ids::REQ_TEST,
            Self::CnfLine { .. } => ids::CNF_LINE,
        }
    }

    /// Body length of a host frame without its terminator
    pub fn body_len(id: u8) -> Option<usize> {
        match id {
            ids::REQ_START => Some(4),
            ids::REQ_INFO | ids::REQ_TEST => Some(1),
            ids::CNF_LINE => Some(LINE_BYTES + 4),
            _ => None,
        }
    }

    /// Serialize into a terminated frame
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(LINE_BYTES + 6);
        frame.push(self.id());

        match self {
            Self::ReqStart {
                start_needle,
                stop_needle,
                continuous_reporting,
            } => {
                frame.push(*start_needle);
                frame.push(*stop_needle);
                frame.push(u8::from(*continuous_reporting));
            }
            Self::ReqInfo | Self::ReqTest => {}
            Self::CnfLine {
                line_number,
                data,
                flags,
            } => {
                frame.push(*line_number);
                frame.extend_from_slice(data);
                frame.push(flags.bits());
                frame.push(crc8(&frame));
            }
        }

        frame.extend_from_slice(&FRAME_TERMINATOR);
        frame
    }

    /// Protocol name of the message
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReqStart { .. } => "reqStart",
            Self::ReqInfo => "reqInfo",
            Self::ReqTest => "reqTest",
            Self::CnfLine { .. } => "cnfLine",
        }
    }
}

impl fmt::Display for HostMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReqStart {
                start_needle,
                stop_needle,
                continuous_reporting,
            } => write!(
                f,
                "reqStart {}..={} reporting={}",
                start_needle, stop_needle, continuous_reporting
            ),
            Self::CnfLine {
                line_number, flags, ..
            } => write!(f, "cnfLine {} flags={:#04x}", line_number, flags.bits()),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Messages sent by the firmware
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// Answer to `reqStart`
    CnfStart {
        /// Whether knitting started.
        success: bool,
    },
    /// Answer to `reqInfo`
    CnfInfo {
        /// Firmware API version.
        api_version: u8,
    },
    /// Answer to `reqTest`
    CnfTest {
        /// Self test result.
        result: u8,
    },
    /// Request for the next line
    ReqLine {
        /// Wire line number requested.
        line_number: u8,
    },
    /// Status indication
    IndState(DeviceStatus),
}

impl DeviceMessage {
    /// Message id
    pub fn id(&self) -> u8 {
        match self {
            Self::CnfStart { .. } => ids::CNF_START,
            Self::CnfInfo { .. } => ids::CNF_INFO,
            Self::CnfTest { .. } => ids::CNF_TEST,
            Self::ReqLine { .. } => ids::REQ_LINE,
            Self::IndState(_) => ids::IND_STATE,
        }
    }

    /// Frame length of a device message kind
    pub fn frame_len(id: u8) -> Option<usize> {
        match id {
            ids::CNF_START | ids::CNF_INFO | ids::CNF_TEST | ids::REQ_LINE => Some(2),
            ids::IND_STATE => Some(8),
            _ => None,
        }
    }

    /// Parse a complete frame whose length matches [`DeviceMessage::frame_len`]
    pub(crate) fn parse(frame: &[u8]) -> Option<Self> {
        let message = match *frame {
            [ids::CNF_START, success] => Self::CnfStart {
                success: success != 0,
            },
            [ids::CNF_INFO, api_version] => Self::CnfInfo { api_version },
            [ids::CNF_TEST, result] => Self::CnfTest { result },
            [ids::REQ_LINE, line_number] => Self::ReqLine { line_number },
            [ids::IND_STATE, ready, hl_hi, hl_lo, hr_hi, hr_lo, carriage, position] => {
                Self::IndState(DeviceStatus {
                    ready: ready != 0,
                    hall_left: u16::from_be_bytes([hl_hi, hl_lo]),
                    hall_right: u16::from_be_bytes([hr_hi, hr_lo]),
                    carriage: Carriage::from_byte(carriage),
                    carriage_position: position,
                })
            }
            _ => return None,
        };
        Some(message)
    }

    /// Serialize into an unterminated frame
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![self.id()];
        match self {
            Self::CnfStart { success } => frame.push(u8::from(*success)),
            Self::CnfInfo { api_version } => frame.push(*api_version),
            Self::CnfTest { result } => frame.push(*result),
            Self::ReqLine { line_number } => frame.push(*line_number),
            Self::IndState(status) => {
                frame.push(u8::from(status.ready));
                frame.extend_from_slice(&status.hall_left.to_be_bytes());
                frame.extend_from_slice(&status.hall_right.to_be_bytes());
                frame.push(status.carriage.as_byte());
                frame.push(status.carriage_position);
            }
        }
        frame
    }

    /// Protocol name of the message
    pub fn name(&self) -> &'static str {
        match self {
            Self::CnfStart { .. } => "cnfStart",
            Self::CnfInfo { .. } => "cnfInfo",
            Self::CnfTest { .. } => "cnfTest",
            Self::ReqLine { .. } => "reqLine",
            Self::IndState(_) => "indState",
        }
    }
}

impl fmt::Display for DeviceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CnfStart { success } => write!(f, "cnfStart success={}", success),
            Self::CnfInfo { api_version } => write!(f, "cnfInfo api={}", api_version),
            Self::CnfTest { result } => write!(f, "cnfTest result={}", result),
            Self::ReqLine { line_number } => write!(f, "reqLine {}", line_number),
            Self::IndState(status) => write!(
                f,
                "indState ready={} {} at {}",
                status.ready, status.carriage, status.carriage_position
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_req_start_layout() {
        let frame = HostMessage::ReqStart {
            start_needle: 80,
            stop_needle: 119,
            continuous_reporting: true,
        }
        .encode();
        assert_eq!(frame, vec![0x01, 80, 119, 1, b'\n', b'\r']);
    }

    #[test]
    fn test_cnf_line_layout() {
        let mut data = [0u8; LINE_BYTES];
        data[12] = 0xF0;
        let frame = HostMessage::CnfLine {
            line_number: 3,
            data,
            flags: LineFlags::LAST_LINE,
        }
        .encode();

        assert_eq!(frame.len(), LINE_BYTES + 6);
        assert_eq!(&frame[..2], &[0x42, 3]);
        assert_eq!(frame[2 + 12], 0xF0);
        assert_eq!(frame[LINE_BYTES + 2], 0x01);
        assert_eq!(frame[LINE_BYTES + 3], crc8(&frame[..LINE_BYTES + 3]));
        assert_eq!(&frame[LINE_BYTES + 4..], &FRAME_TERMINATOR);
        assert_eq!(
            HostMessage::body_len(ids::CNF_LINE),
            Some(frame.len() - FRAME_TERMINATOR.len())
        );
    }

    #[test]
    fn test_short_host_frames() {
        assert_eq!(HostMessage::ReqInfo.encode(), vec![0x03, b'\n', b'\r']);
        assert_eq!(HostMessage::ReqTest.encode(), vec![0x04, b'\n', b'\r']);
    }

    #[test]
    fn test_ind_state_parse() {
        let frame = [0x84, 1, 0x01, 0x02, 0x03, 0x04, 2, 57];
        let message = DeviceMessage::parse(&frame).unwrap();
        assert_eq!(
            message,
            DeviceMessage::IndState(DeviceStatus {
                ready: true,
                hall_left: 0x0102,
                hall_right: 0x0304,
                carriage: Carriage::Lace,
                carriage_position: 57,
            })
        );
        assert_eq!(message.encode(), frame.to_vec());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(DeviceMessage::parse(&[0x82]).is_none());
        assert!(DeviceMessage::parse(&[0x82, 1, 2]).is_none());
        assert_eq!(
            DeviceMessage::parse(&[0x82, 9]),
            Some(DeviceMessage::ReqLine { line_number: 9 })
        );
    }
}
