use std::io::{BufRead, BufReader, ErrorKind};
use std::time::Duration;

use ftcal_traits::{BoxError, RawLineSource};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::{HwError, Result};

/// Newline-delimited records from the 8-channel sensor's serial port (8N1).
pub struct SerialLineSource {
    reader: BufReader<Box<dyn SerialPort>>,
    port_name: String,
    // Bytes of a line interrupted by a timeout; completed on the next call
    pending: String,
}

impl SerialLineSource {
    pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let sp = serialport::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| HwError::Serial(format!("open {port}: {e}")))?;
        tracing::info!(port, baud_rate, "serial port opened");
        Ok(Self {
            reader: BufReader::new(sp),
            port_name: port.to_string(),
            pending: String::new(),
        })
    }

    fn next_line(&mut self, timeout: Duration) -> Result<String> {
        self.reader
            .get_mut()
            .set_timeout(timeout)
            .map_err(|e| HwError::Serial(e.to_string()))?;
        match self.reader.read_line(&mut self.pending) {
            Ok(0) => Err(HwError::Disconnected),
            Ok(_) => {
                let line = self.pending.trim_end_matches(['\r', '\n']).to_string();
                self.pending.clear();
                Ok(line)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(HwError::Timeout),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                // Line noise that is not UTF-8: drop it, the decoder would reject it anyway.
                self.pending.clear();
                Ok(String::new())
            }
            Err(e) => Err(HwError::Io(e)),
        }
    }
}

impl RawLineSource for SerialLineSource {
    fn read_line(&mut self, timeout: Duration) -> std::result::Result<String, BoxError> {
        self.next_line(timeout).map_err(|e| {
            if !matches!(e, HwError::Timeout) {
                tracing::error!(port = %self.port_name, error = %e, "serial read failed");
            }
            Box::new(e) as BoxError
        })
    }
}
