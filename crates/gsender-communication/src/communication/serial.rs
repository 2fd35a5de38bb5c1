//! Serial port transport
//!
//! Wraps a `serialport` handle with a short read timeout so `receive` can be
//! polled from the session loop without blocking it.

use super::{Communicator, ConnectionParams};
use gsender_core::{ConnectionError, Error, Result};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,
    /// Human-readable description
    pub description: String,
    /// Manufacturer name if available
    pub manufacturer: Option<String>,
    /// USB vendor ID if applicable
    pub vid: Option<u16>,
    /// USB product ID if applicable
    pub pid: Option<u16>,
}

/// List serial ports that look like CNC controllers
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        Error::other(format!("Failed to enumerate ports: {}", e))
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_controller_port(&port.port_name))
        .map(|port| {
            let mut info = SerialPortInfo {
                port_name: port.port_name.clone(),
                description: describe(port),
                manufacturer: None,
                vid: None,
                pid: None,
            };
            if let serialport::SerialPortType::UsbPort(usb) = &port.port_type {
                info.manufacturer = usb.manufacturer.clone();
                info.vid = Some(usb.vid);
                info.pid = Some(usb.pid);
            }
            info
        })
        .collect())
}

/// Windows COM ports, Linux USB/ACM devices, macOS usbserial/usbmodem
fn is_controller_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }
    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn describe(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb) => format!(
            "USB {} {}",
            usb.manufacturer.as_deref().unwrap_or("Device"),
            usb.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Communicator over a physical serial port
#[derive(Default)]
pub struct SerialCommunicator {
    port: Option<Box<dyn serialport::SerialPort>>,
    port_name: Option<String>,
}

impl SerialCommunicator {
    /// Create a disconnected communicator
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the open port
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port.as_mut().ok_or_else(|| {
            ConnectionError::ConnectionLost {
                reason: "port is not open".to_string(),
            }
            .into()
        })
    }
}

impl std::fmt::Debug for SerialCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialCommunicator")
            .field("port_name", &self.port_name)
            .field("connected", &self.port.is_some())
            .finish()
    }
}

impl Communicator for SerialCommunicator {
    fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        if params.port.is_empty() {
            return Err(ConnectionError::InvalidParameters {
                reason: "no port given".to_string(),
            }
            .into());
        }

        let port = serialport::new(&params.port, params.baud_rate)
            .timeout(Duration::from_millis(params.timeout_ms.max(1)))
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                match e.kind {
                    serialport::ErrorKind::NoDevice => ConnectionError::PortNotFound {
                        port: params.port.clone(),
                    },
                    _ => ConnectionError::FailedToOpen {
                        port: params.port.clone(),
                        reason: e.to_string(),
                    },
                }
            })?;

        tracing::info!("Opened {} at {} baud", params.port, params.baud_rate);
        self.port = Some(port);
        self.port_name = Some(params.port.clone());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if let Some(name) = self.port_name.take() {
            tracing::info!("Closed {}", name);
        }
        self.port = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.port_mut()?;
        let written = port.write_all(data);
        let flushed = written.and_then(|_| port.flush());
        flushed.map_err(|e| ConnectionError::WriteFailed {
            reason: e.to_string(),
        })?;
        Ok(data.len())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        let port = self.port_mut()?;
        let mut buf = [0u8; 512];
        match port.read(&mut buf) {
            Ok(0) => Err(ConnectionError::ConnectionLost {
                reason: "port closed".to_string(),
            }
            .into()),
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(ConnectionError::ConnectionLost {
                reason: e.to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_port_patterns() {
        assert!(is_controller_port("COM3"));
        assert!(is_controller_port("/dev/ttyUSB0"));
        assert!(is_controller_port("/dev/ttyACM1"));
        assert!(is_controller_port("/dev/cu.usbmodem1421"));
        assert!(!is_controller_port("COM"));
        assert!(!is_controller_port("COMx"));
        assert!(!is_controller_port("/dev/ttyS0"));
    }

    #[test]
    fn test_send_without_port_fails() {
        let mut comm = SerialCommunicator::new();
        assert!(!comm.is_connected());
        let err = comm.send(b"?").unwrap_err();
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_connect_requires_port() {
        let mut comm = SerialCommunicator::new();
        let err = comm.connect(&ConnectionParams::default()).unwrap_err();
        assert!(err.is_connection_error());
    }
}
