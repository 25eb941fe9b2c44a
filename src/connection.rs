//! Serial transport for the Arduino light sensor.
//!
//! The acquisition loop only needs two things from the link: read one line
//! (blocking, bounded by the read timeout) and throw away whatever is queued.
//! Those are captured by [`LineSource`]; [`SerialConnection`] implements it on
//! top of the `serialport` crate.

use std::io::{ErrorKind, Read};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, SerialPort};

use crate::errors::{Result, SensorError};

/// Baud rate used by the Arduino sketch.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Read timeout for a single line.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// A line longer than this without a terminator is handed to the decoder as-is.
const MAX_LINE_LEN: usize = 256;

const READ_CHUNK: usize = 64;

/// Anything that can deliver wire-protocol lines.
pub trait LineSource {
    /// Read bytes up to and excluding the next `\n`.
    ///
    /// A read timeout yields whatever arrived before it (possibly nothing).
    /// Losing the transport is reported as [`SensorError::ConnectionLost`].
    fn read_line(&mut self) -> Result<Vec<u8>>;

    /// Drop all input received but not yet read.
    fn discard_input(&mut self) -> Result<()>;
}

impl<T: LineSource + ?Sized> LineSource for &mut T {
    fn read_line(&mut self) -> Result<Vec<u8>> {
        (**self).read_line()
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }
}

/// Port settings; everything but the port name matches the Arduino sketch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl SerialSettings {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Names of the serial ports present on this machine.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// An open serial link to the sensor.
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl SerialConnection {
    pub fn open(settings: &SerialSettings) -> Result<Self> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(settings.timeout)
            .open()?;
        debug!(
            "Opened {} at {} baud (timeout {:?})",
            settings.port, settings.baud_rate, settings.timeout
        );
        Ok(Self {
            port,
            pending: Vec::with_capacity(MAX_LINE_LEN),
        })
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }

    /// Close the port. Dropping the connection has the same effect.
    pub fn close(self) {
        debug!("Closing {}", self.name().unwrap_or_default());
    }
}

impl LineSource for SerialConnection {
    fn read_line(&mut self) -> Result<Vec<u8>> {
        read_line_from(&mut self.port, &mut self.pending)
    }

    fn discard_input(&mut self) -> Result<()> {
        self.pending.clear();
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| SensorError::ConnectionLost(e.to_string()))
    }
}

/// Pull one `\n`-terminated line out of `reader`, carrying leftover bytes in
/// `pending` between calls.
fn read_line_from<R: Read + ?Sized>(reader: &mut R, pending: &mut Vec<u8>) -> Result<Vec<u8>> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(pos) = pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = pending.drain(..=pos).collect();
            line.pop();
            return Ok(line);
        }
        if pending.len() >= MAX_LINE_LEN {
            warn!("No line terminator in {} bytes", pending.len());
            return Ok(std::mem::take(pending));
        }

        match reader.read(&mut chunk) {
            Ok(0) => return Err(SensorError::ConnectionLost("end of stream".to_string())),
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                debug!("Read timed out with {} bytes pending", pending.len());
                return Ok(std::mem::take(pending));
            }
            Err(e) => return Err(SensorError::ConnectionLost(e.to_string())),
        }
    }
}


#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use super::*;

    /// Reader replaying a fixed sequence of chunks and errors.
    struct Chunks(VecDeque<io::Result<Vec<u8>>>);

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    fn chunks(items: Vec<io::Result<&[u8]>>) -> Chunks {
        Chunks(items.into_iter().map(|r| r.map(|b| b.to_vec())).collect())
    }

    #[test]
    fn splits_lines_across_chunks() {
        let mut reader = chunks(vec![Ok(&b"100 40 25"[..]), Ok(&b"00 16\r\n200 8"[..]), Ok(&b"0 3000 0\n"[..])]);
        let mut pending = Vec::new();
        assert_eq!(read_line_from(&mut reader, &mut pending).unwrap(), b"100 40 2500 16\r");
        assert_eq!(read_line_from(&mut reader, &mut pending).unwrap(), b"200 80 3000 0");
        assert!(pending.is_empty());
    }

    #[test]
    fn timeout_returns_partial_line() {
        let mut reader = chunks(vec![
            Ok(&b"100 40"[..]),
            Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
        ]);
        let mut pending = Vec::new();
        assert_eq!(read_line_from(&mut reader, &mut pending).unwrap(), b"100 40");
    }

    #[test]
    fn timeout_with_nothing_returns_empty_line() {
        let mut reader = chunks(vec![Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"))]);
        let mut pending = Vec::new();
        assert!(read_line_from(&mut reader, &mut pending).unwrap().is_empty());
    }

    #[test]
    fn broken_pipe_is_connection_lost() {
        let mut reader = chunks(vec![Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))]);
        let mut pending = Vec::new();
        assert!(matches!(
            read_line_from(&mut reader, &mut pending),
            Err(SensorError::ConnectionLost(_))
        ));
    }

    #[test]
    fn end_of_stream_is_connection_lost() {
        let mut reader = chunks(vec![]);
        let mut pending = Vec::new();
        assert!(matches!(
            read_line_from(&mut reader, &mut pending),
            Err(SensorError::ConnectionLost(_))
        ));
    }

    #[test]
    fn overlong_line_is_cut() {
        let long = vec![b'7'; MAX_LINE_LEN];
        let mut reader = Chunks(
            long.chunks(READ_CHUNK)
                .map(|c| Ok(c.to_vec()))
                .collect(),
        );
        let mut pending = Vec::new();
        assert_eq!(read_line_from(&mut reader, &mut pending).unwrap().len(), MAX_LINE_LEN);
    }

    #[test]
    fn settings_default_to_sketch_values() {
        let s = SerialSettings::new("/dev/ttyACM0");
        assert_eq!(s.port, "/dev/ttyACM0");
        assert_eq!(s.baud_rate, 9600);
        assert_eq!(s.timeout, Duration::from_secs(2));
    }
}
