//! Serial port transport
//!
//! Provides the USB serial link to the knitting firmware.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Fixed 115200 baud, 8N1 framing
//! - Bounded blocking reads

use super::Transport;
use knitkit_core::{Error, TransportError};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Baud rate of the knitting firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default bound on a single blocking read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Arduino Uno")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List serial ports a knitting controller may be attached to
///
/// Only USB serial style devices are returned:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial*, /dev/cu.usbmodem*
pub fn list_ports() -> knitkit_core::Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        Error::other(format!("Failed to enumerate ports: {}", e))
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_candidate_port(&port.port_name))
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb_info) => {
                    let info = info.with_usb_ids(usb_info.vid, usb_info.pid);
                    match &usb_info.manufacturer {
                        Some(mfg) => info.with_manufacturer(mfg),
                        None => info,
                    }
                }
                _ => info,
            }
        })
        .collect())
}

/// Check if a port name looks like a USB serial device
fn is_candidate_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial")
        || port_name.starts_with("/dev/cu.usbmodem")
}

/// Get a user-friendly description for a port
fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Transport over a real serial port
pub struct SerialTransport {
    baud_rate: u32,
    read_timeout: Duration,
    port_name: Option<String>,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    /// Create a closed transport with the firmware's default settings
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT)
    }

    /// Create a closed transport with explicit settings
    pub fn with_settings(baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            baud_rate,
            read_timeout,
            port_name: None,
            port: None,
        }
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, port: &str) -> Result<(), TransportError> {
        if self.port.is_some() {
            self.close()?;
        }

        let opened = serialport::new(port, self.baud_rate)
            .timeout(self.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", port, e);
                TransportError::FailedToOpen {
                    port: port.to_string(),
                    reason: e.to_string(),
                }
            })?;

        tracing::info!("Opened {} at {} baud", port, self.baud_rate);
        self.port = Some(opened);
        self.port_name = Some(port.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.port.take().is_some() {
            tracing::info!("Closed {}", self.name());
        }
        self.port_name = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        let count = self
            .port_mut()?
            .bytes_to_read()
            .map_err(|e| TransportError::ReadFailed {
                reason: e.to_string(),
            })?;
        Ok(count as usize)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        let mut byte = [0u8; 1];
        match self.port_mut()?.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(TransportError::ReadFailed {
                reason: e.to_string(),
            }),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port_mut()?;
        port.write_all(data)
            .and_then(|_| port.flush())
            .map_err(|e| TransportError::WriteFailed {
                reason: e.to_string(),
            })
    }

    fn name(&self) -> String {
        self.port_name
            .clone()
            .unwrap_or_else(|| "serial (closed)".to_string())
    }
}
