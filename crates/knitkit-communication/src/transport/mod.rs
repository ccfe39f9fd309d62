//! Byte transports to the knitting firmware
//!
//! Provides:
//! - The [`Transport`] trait the session engine talks through
//! - A `serialport` backed implementation
//! - A simulated device for tests and dry runs

pub mod serial;
pub mod simulated;

pub use serial::{list_ports, SerialPortInfo, SerialTransport, DEFAULT_BAUD_RATE};
pub use simulated::{ReceivedLine, SimulatedDevice, SimulatedDeviceConfig};

use knitkit_core::TransportError;

/// Owner of the serial byte stream
///
/// Reads are blocking but bounded: [`Transport::read_byte`] waits at most the
/// transport's read timeout and returns `Ok(None)` when nothing arrived.
pub trait Transport: Send {
    /// Open the named port
    fn open(&mut self, port: &str) -> Result<(), TransportError>;

    /// Close the port; closing a closed transport is a no-op
    fn close(&mut self) -> Result<(), TransportError>;

    /// Check whether the port is open
    fn is_open(&self) -> bool;

    /// Number of bytes that can be read without blocking
    fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// Read a single byte, `None` on timeout
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError>;

    /// Write a whole frame
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Name of the open port, or a description of the transport
    fn name(&self) -> String;

    /// Drain everything currently readable into `buf`
    ///
    /// Blocks for one read timeout when nothing is pending.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize, TransportError> {
        let available = self.bytes_available()?;
        if available == 0 {
            return match self.read_byte()? {
                Some(byte) => {
                    buf.push(byte);
                    Ok(1)
                }
                None => Ok(0),
            };
        }

        let mut read = 0;
        for _ in 0..available {
            match self.read_byte()? {
                Some(byte) => {
                    buf.push(byte);
                    read += 1;
                }
                None => break,
            }
        }
        Ok(read)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, port: &str) -> Result<(), TransportError> {
        (**self).open(port)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        (**self).read_byte()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}
