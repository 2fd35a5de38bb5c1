//! Transport layer
//!
//! A `Communicator` is the exclusively-owned byte pipe to one controller.
//! Lines are newline-terminated ASCII; realtime commands are single bytes
//! written outside the line stream.

pub mod serial;

use gsender_core::{ConnectionError, Result};

pub use serial::{list_ports, SerialCommunicator, SerialPortInfo};

/// Connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Port path
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115200,
            timeout_ms: 50,
        }
    }
}

impl From<&gsender_core::ConnectionSettings> for ConnectionParams {
    fn from(settings: &gsender_core::ConnectionSettings) -> Self {
        Self {
            port: settings.port.clone(),
            baud_rate: settings.baud_rate,
            timeout_ms: settings.timeout_ms,
        }
    }
}

/// Byte-level connection to a controller
pub trait Communicator: Send {
    /// Open the connection
    fn connect(&mut self, params: &ConnectionParams) -> Result<()>;

    /// Close the connection
    fn disconnect(&mut self) -> Result<()>;

    /// Whether the connection is open
    fn is_connected(&self) -> bool;

    /// Write raw bytes, returning how many were written
    fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Read whatever bytes are available; empty when nothing arrived
    fn receive(&mut self) -> Result<Vec<u8>>;

    /// Write one line, appending the newline
    fn send_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        let written = self.send(&data)?;
        if written != data.len() {
            return Err(ConnectionError::WriteFailed {
                reason: format!("short write: {} of {} bytes", written, data.len()),
            }
            .into());
        }
        Ok(())
    }

    /// Write a single realtime byte
    fn send_realtime(&mut self, byte: u8) -> Result<()> {
        self.send(&[byte])?;
        Ok(())
    }
}

/// Communicator that accepts and discards everything
#[derive(Debug, Default)]
pub struct NoOpCommunicator {
    connected: bool,
}

impl NoOpCommunicator {
    /// Create a disconnected no-op communicator
    pub fn new() -> Self {
        Self::default()
    }
}

impl Communicator for NoOpCommunicator {
    fn connect(&mut self, _params: &ConnectionParams) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        Ok(data.len())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Splits received bytes into complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and drain every complete, non-empty, trimmed line
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(data));
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Drop any partial line
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_splits_partial_reads() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"o").is_empty());
        assert_eq!(buffer.push(b"k\r\n<Idle|MPos:0,0,0>\r\nerr"), vec!["ok", "<Idle|MPos:0,0,0>"]);
        assert_eq!(buffer.push(b"or:20\n\n"), vec!["error:20"]);
    }

    #[test]
    fn test_noop_send_line() {
        let mut comm = NoOpCommunicator::new();
        comm.connect(&ConnectionParams::default()).unwrap();
        assert!(comm.is_connected());
        assert!(comm.send_line("G0 X0").is_ok());
        comm.disconnect().unwrap();
        assert!(!comm.is_connected());
    }
}
