// Line-oriented serial transport to the motor controller
//
// The controller speaks newline-terminated ASCII: we write one token per
// line and read back echoes, telemetry, and "Done" markers line by line.

use serialport::{self, SerialPort};
use std::io::{ErrorKind, Read, Write};
use tracing::debug;

use crate::config::{BAUD_RATE, DEVICE_PATH, SERIAL_READ_TIMEOUT};

/// Error types for the serial link
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// An open, exclusively owned connection to the controller
pub trait SerialLink: Send {
    /// Write `token` followed by a newline and flush
    fn write_line(&mut self, token: &str) -> Result<()>;

    /// Next complete non-empty line, trimmed. `None` when nothing arrived
    /// within the link's own read timeout.
    fn read_line(&mut self) -> Result<Option<String>>;
}

/// Opens a fresh link for each protocol run
pub trait LinkOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn SerialLink>>;

    /// Human-readable target, e.g. "/dev/ttyACM0 @ 115200"
    fn describe(&self) -> String;
}

/// Opens the real serial device
#[derive(Debug, Clone)]
pub struct SerialPortOpener {
    path: String,
    baud: u32,
}

impl SerialPortOpener {
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        Self {
            path: path.into(),
            baud,
        }
    }
}

impl Default for SerialPortOpener {
    fn default() -> Self {
        Self::new(DEVICE_PATH, BAUD_RATE)
    }
}

impl LinkOpener for SerialPortOpener {
    fn open(&self) -> Result<Box<dyn SerialLink>> {
        let port = serialport::new(&self.path, self.baud)
            .timeout(SERIAL_READ_TIMEOUT)
            .open()?;
        Ok(Box::new(SerialPortLink::new(port)))
    }

    fn describe(&self) -> String {
        format!("{} @ {}", self.path, self.baud)
    }
}

/// Line framing over a raw serial port
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl SerialPortLink {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            pending: Vec::with_capacity(128),
        }
    }
}

impl SerialLink for SerialPortLink {
    fn write_line(&mut self, token: &str) -> Result<()> {
        self.port.write_all(token.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(line) = take_line(&mut self.pending) {
                if line.is_empty() {
                    continue;
                }
                debug!("serial <- {}", line);
                return Ok(Some(line));
            }

            let mut chunk = [0u8; 64];
            match self.port.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(LinkError::Io(e)),
            }
        }
    }
}

/// Split the first newline-terminated line off `buf`, trimmed.
/// Invalid UTF-8 is replaced rather than rejected; telemetry is often noisy right after reset.
fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    let newline = buf.iter().position(|&b| b == b'\n')?;
    let raw: Vec<u8> = buf.drain(..=newline).collect();
    Some(String::from_utf8_lossy(&raw).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_line_splits_on_newline() {
        let mut buf = b"Done4\r\nax: 0.1".to_vec();
        assert_eq!(take_line(&mut buf), Some("Done4".to_string()));
        assert_eq!(buf, b"ax: 0.1".to_vec());
        assert_eq!(take_line(&mut buf), None);
    }

    #[test]
    fn test_take_line_keeps_blank_lines_for_caller_to_skip() {
        let mut buf = b"\r\n5\n".to_vec();
        assert_eq!(take_line(&mut buf), Some(String::new()));
        assert_eq!(take_line(&mut buf), Some("5".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_take_line_tolerates_garbage_bytes() {
        let mut buf = vec![0xFF, b'o', b'k', b'\n'];
        let line = take_line(&mut buf).unwrap();
        assert!(line.ends_with("ok"));
    }

    #[test]
    fn test_opener_description() {
        let opener = SerialPortOpener::new("/dev/ttyUSB3", 9600);
        assert_eq!(opener.describe(), "/dev/ttyUSB3 @ 9600");
        assert_eq!(SerialPortOpener::default().describe(), "/dev/ttyACM0 @ 115200");
    }

    #[test]
    fn test_open_missing_device_fails() {
        let opener = SerialPortOpener::new("/dev/does-not-exist-drawbot", 115_200);
        assert!(opener.open().is_err());
    }
}
