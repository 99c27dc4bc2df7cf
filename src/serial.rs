use anyhow::{Context, Result};
use log::warn;
use serialport::SerialPort;
use std::io::{ErrorKind, Read};
use std::thread;
use std::time::Duration;

/// Longest command line accepted, terminator excluded.
const MAX_LINE_LEN: usize = 256;

const READ_BUFFER_SIZE: usize = 256;

/// Open a serial port 8N1 with no flow control.
///
/// `timeout` bounds every read and write on the port.
pub fn open_port(name: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialPort>> {
    let mut port = serialport::new(name, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(timeout)
        .open()
        .context(format!("Failed to open serial port {}", name))?;

    if let Err(e) = port.write_data_terminal_ready(true) {
        warn!("Failed to set DTR on {}: {}", name, e);
    }

    // Allow device to initialize
    thread::sleep(Duration::from_millis(100));

    Ok(port)
}

/// Splits a byte stream into text lines without ever blocking longer than
/// one read of the underlying reader.
pub struct LineReader<R> {
    reader: R,
    pending: Vec<u8>,
    overflowed: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(reader: R) -> Self {
        LineReader {
            reader,
            pending: Vec::new(),
            overflowed: false,
        }
    }

    /// Read once and return every line completed by it.
    ///
    /// A read that times out yields no lines; only real I/O errors are
    /// returned as errors.
    pub fn poll(&mut self) -> std::io::Result<Vec<String>> {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        match self.reader.read(&mut buf) {
            Ok(n) => self.pending.extend_from_slice(&buf[..n]),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e),
        }

        Ok(self.take_lines())
    }

    fn take_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();

        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            if std::mem::take(&mut self.overflowed) {
                // Tail of a line that was already discarded
                continue;
            }
            if end > MAX_LINE_LEN {
                warn!("Discarding line of {} bytes", end);
                continue;
            }
            lines.push(String::from_utf8_lossy(&raw[..end]).into_owned());
        }

        if self.pending.len() > MAX_LINE_LEN {
            warn!(
                "Discarding {} bytes of input with no line terminator",
                self.pending.len()
            );
            self.pending.clear();
            self.overflowed = true;
        }

        lines
    }
}
