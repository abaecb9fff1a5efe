//! Trait abstraction for serial port operations to enable testing

use std::io::{self, Read};
use std::time::Duration;
use tokio_serial::SerialPort;

use crate::error::{MonitorError, Result};

/// Trait for non-blocking serial port reads
#[cfg_attr(test, mockall::automock)]
pub trait LinePort: Send {
    /// Number of bytes waiting in the receive buffer
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Wrapper around an OS serial port that implements LinePort
pub struct SystemSerialPort {
    port: Box<dyn SerialPort>,
}

impl SystemSerialPort {
    /// Open `path` at `baud_rate` with 8N1 framing and no flow control.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Connection`] with the port name and the
    /// driver's message if the port cannot be opened.
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| MonitorError::Connection(format!("Failed to open {}: {}", path, e)))?;

        Ok(Self { port })
    }
}

impl LinePort for SystemSerialPort {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let waiting = self.port.bytes_to_read().map_err(io::Error::from)?;
        Ok(waiting as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}
