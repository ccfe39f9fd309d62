//! Simulated knitting firmware
//!
//! Answers host frames the way the firmware does and requests lines from a
//! script of wire line numbers. State is shared behind a lock so a test can
//! keep a handle for inspection while the session owns the transport.

use super::Transport;
use crate::protocol::{decode_host_frame, ids, DeviceMessage, HostMessage, LineFlags, FRAME_TERMINATOR};
use knitkit_core::{DeviceStatus, ProtocolViolation, TransportError, LINE_BYTES, PROTOCOL_API_VERSION};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Behaviour of a simulated device
#[derive(Debug, Clone)]
pub struct SimulatedDeviceConfig {
    /// API version reported in `cnfInfo`
    pub api_version: u8,
    /// Answer `reqStart` with success
    pub accept_start: bool,
    /// Status sent after a successful start
    pub start_status: Option<DeviceStatus>,
    /// Result reported in `cnfTest`
    pub test_result: u8,
    /// Time the carriage needs for one pass
    pub pass_delay: Duration,
    /// Bound on a single blocking read
    pub read_timeout: Duration,
}

impl Default for SimulatedDeviceConfig {
    fn default() -> Self {
        Self {
            api_version: PROTOCOL_API_VERSION,
            accept_start: true,
            start_status: None,
            test_result: 1,
            pass_delay: Duration::ZERO,
            read_timeout: Duration::from_millis(5),
        }
    }
}

/// A `cnfLine` the device accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedLine {
    /// Wire line number
    pub line_number: u8,
    /// Full-bed needle bits
    pub data: [u8; LINE_BYTES],
    /// Line flags
    pub flags: LineFlags,
}

impl ReceivedLine {
    /// Check whether a bed needle is active
    pub fn needle(&self, needle: usize) -> bool {
        needle < LINE_BYTES * 8 && self.data[needle / 8] & (1 << (needle % 8)) != 0
    }

    /// Check the last-line flag
    pub fn is_last(&self) -> bool {
        self.flags.contains(LineFlags::LAST_LINE)
    }
}

#[derive(Debug, Default)]
struct SimulatedState {
    port: Option<String>,
    script: VecDeque<u8>,
    last_request: Option<u8>,
    pending: Vec<u8>,
    outgoing: VecDeque<u8>,
    not_before: Option<Instant>,
    host_messages: Vec<HostMessage>,
    lines: Vec<ReceivedLine>,
    corrupt_lines: usize,
    checksum_failures: usize,
    finished: bool,
}

/// Simulated firmware endpoint
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    config: SimulatedDeviceConfig,
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedDevice {
    /// Create a device that requests the given wire line numbers in order
    pub fn new(config: SimulatedDeviceConfig, script: impl IntoIterator<Item = u8>) -> Self {
        let state = SimulatedState {
            script: script.into_iter().collect(),
            ..SimulatedState::default()
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Create a default device for a script
    pub fn with_script(script: impl IntoIterator<Item = u8>) -> Self {
        Self::new(SimulatedDeviceConfig::default(), script)
    }

    /// Queue raw bytes for the host
    pub fn inject(&self, bytes: &[u8]) {
        self.state.lock().outgoing.extend(bytes.iter().copied());
    }

    /// Queue a device message for the host
    pub fn send(&self, message: &DeviceMessage) {
        self.state.lock().push_message(message);
    }

    /// Damage the next `count` line frames before they are checked
    pub fn corrupt_next_lines(&self, count: usize) {
        self.state.lock().corrupt_lines += count;
    }

    /// Every decoded host message, in arrival order
    pub fn host_messages(&self) -> Vec<HostMessage> {
        self.state.lock().host_messages.clone()
    }

    /// Accepted line frames
    pub fn lines(&self) -> Vec<ReceivedLine> {
        self.state.lock().lines.clone()
    }

    /// Number of line frames that failed the CRC check
    pub fn checksum_failures(&self) -> usize {
        self.state.lock().checksum_failures
    }

    /// Check whether the device received the last line
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    fn handle_frames(&self) {
        let line_frame_len = LINE_BYTES + 4 + FRAME_TERMINATOR.len();
        let mut state = self.state.lock();
        loop {
            if state.corrupt_lines > 0
                && state.pending.len() >= line_frame_len
                && state.pending[0] == ids::CNF_LINE
            {
                state.pending[2] ^= 0xFF;
                state.corrupt_lines -= 1;
            }

            match decode_host_frame(&state.pending) {
                Ok(Some((consumed, message))) => {
                    state.pending.drain(..consumed);
                    self.respond(&mut state, message);
                }
                Ok(None) => break,
                Err(ProtocolViolation::ChecksumMismatch { expected, actual }) => {
                    let drained = line_frame_len.min(state.pending.len());
                    state.pending.drain(..drained);
                    state.checksum_failures += 1;
                    tracing::debug!(
                        "Simulated device: checksum 0x{:02X} != 0x{:02X}, re-requesting",
                        actual,
                        expected
                    );
                    if let Some(line_number) = state.last_request {
                        self.request_line(&mut state, line_number);
                    }
                }
                Err(e) => {
                    tracing::warn!("Simulated device dropped input: {}", e);
                    state.pending.clear();
                    break;
                }
            }
        }
    }

    fn respond(&self, state: &mut SimulatedState, message: HostMessage) {
        tracing::trace!("Simulated device received {}", message);
        state.host_messages.push(message.clone());

        match message {
            HostMessage::ReqInfo => state.push_message(&DeviceMessage::CnfInfo {
                api_version: self.config.api_version,
            }),
            HostMessage::ReqTest => state.push_message(&DeviceMessage::CnfTest {
                result: self.config.test_result,
            }),
            HostMessage::ReqStart { .. } => {
                state.push_message(&DeviceMessage::CnfStart {
                    success: self.config.accept_start,
                });
                if !self.config.accept_start {
                    return;
                }
                if let Some(status) = self.config.start_status {
                    state.push_message(&DeviceMessage::IndState(status));
                }
                self.request_next(state);
            }
            HostMessage::CnfLine {
                line_number,
                data,
                flags,
            } => {
                let line = ReceivedLine {
                    line_number,
                    data,
                    flags,
                };
                let last = line.is_last();
                state.lines.push(line);
                if last {
                    state.finished = true;
                } else {
                    self.request_next(state);
                }
            }
        }
    }

    fn request_next(&self, state: &mut SimulatedState) {
        if let Some(line_number) = state.script.pop_front() {
            self.request_line(state, line_number);
        }
    }

    fn request_line(&self, state: &mut SimulatedState, line_number: u8) {
        if !self.config.pass_delay.is_zero() {
            state.not_before = Some(Instant::now() + self.config.pass_delay);
        }
        state.last_request = Some(line_number);
        state.push_message(&DeviceMessage::ReqLine { line_number });
    }

    fn readable(&self) -> usize {
        let state = self.state.lock();
        match state.not_before {
            Some(at) if Instant::now() < at => 0,
            _ => state.outgoing.len(),
        }
    }
}

impl SimulatedState {
    fn push_message(&mut self, message: &DeviceMessage) {
        self.outgoing.extend(message.encode());
        self.outgoing.extend(b"\r\n");
    }
}

impl Transport for SimulatedDevice {
    fn open(&mut self, port: &str) -> Result<(), TransportError> {
        tracing::info!("Simulated device attached as {}", port);
        self.state.lock().port = Some(port.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.state.lock().port = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().port.is_some()
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        Ok(self.readable())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }

        if self.readable() == 0 {
            let wait = {
                let state = self.state.lock();
                state
                    .not_before
                    .map(|at| at.saturating_duration_since(Instant::now()))
                    .filter(|remaining| !remaining.is_zero() && !state.outgoing.is_empty())
                    .map_or(self.config.read_timeout, |remaining| {
                        remaining.min(self.config.read_timeout)
                    })
            };
            std::thread::sleep(wait);
            if self.readable() == 0 {
                return Ok(None);
            }
        }

        Ok(self.state.lock().outgoing.pop_front())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.state.lock().pending.extend_from_slice(data);
        self.handle_frames();
        Ok(())
    }

    fn name(&self) -> String {
        self.state
            .lock()
            .port
            .clone()
            .unwrap_or_else(|| "simulated (closed)".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode_frame;

    fn drain(device: &mut SimulatedDevice) -> Vec<DeviceMessage> {
        let mut buf = Vec::new();
        while device.read_available(&mut buf).unwrap() > 0 {}

        let mut messages = Vec::new();
        let mut offset = 0;
        while let Some((consumed, message)) = decode_frame(&buf[offset..]).unwrap() {
            offset += consumed;
            messages.push(message);
        }
        messages
    }

    #[test]
    fn test_closed_device_rejects_io() {
        let mut device = SimulatedDevice::with_script(Vec::new());
        assert_eq!(device.write(&[0x03]), Err(TransportError::NotOpen));
        assert_eq!(device.bytes_available(), Err(TransportError::NotOpen));
    }

    #[test]
    fn test_info_and_start() {
        let mut device = SimulatedDevice::with_script([0, 1]);
        device.open("sim").unwrap();

        device.write(&HostMessage::ReqInfo.encode()).unwrap();
        assert_eq!(
            drain(&mut device),
            vec![DeviceMessage::CnfInfo {
                api_version: PROTOCOL_API_VERSION
            }]
        );

        device
            .write(
                &HostMessage::ReqStart {
                    start_needle: 0,
                    stop_needle: 199,
                    continuous_reporting: false,
                }
                .encode(),
            )
            .unwrap();
        assert_eq!(
            drain(&mut device),
            vec![
                DeviceMessage::CnfStart { success: true },
                DeviceMessage::ReqLine { line_number: 0 }
            ]
        );
    }

    #[test]
    fn test_corrupted_line_is_requested_again() {
        let mut device = SimulatedDevice::with_script([4, 5]);
        device.open("sim").unwrap();
        device
            .write(
                &HostMessage::ReqStart {
                    start_needle: 0,
                    stop_needle: 199,
                    continuous_reporting: false,
                }
                .encode(),
            )
            .unwrap();
        drain(&mut device);

        device.corrupt_next_lines(1);
        let line = HostMessage::CnfLine {
            line_number: 4,
            data: [0; LINE_BYTES],
            flags: LineFlags::empty(),
        };
        device.write(&line.encode()).unwrap();
        assert_eq!(device.checksum_failures(), 1);
        assert_eq!(
            drain(&mut device),
            vec![DeviceMessage::ReqLine { line_number: 4 }]
        );

        device.write(&line.encode()).unwrap();
        assert_eq!(device.lines().len(), 1);
        assert_eq!(
            drain(&mut device),
            vec![DeviceMessage::ReqLine { line_number: 5 }]
        );
    }
}
