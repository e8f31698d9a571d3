//! Real, `serialport`-backed [`Platform`] implementation used by the CLI
//! binary. The engine itself never sleeps or blocks; this is the one place
//! that translates its "arm a timeout" requests into wall-clock waits,
//! by giving the underlying port a short read timeout and polling it from
//! [`crate::run`]'s loop.

use std::time::{Duration, Instant};

use serialport::{SerialPort, SerialPortType};

use crate::device::DeviceRecord;
use crate::error::ConnectionError;
use crate::platform::{Platform, ResetOutcome};

/// How long a single blocking read call waits for data before returning,
/// i.e. the granularity at which the run loop can notice an expired timer.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

const DEFAULT_BAUD: u32 = 38_400;

pub struct SerialPlatform {
    port: Option<Box<dyn SerialPort>>,
    started_at: Instant,
    deadline: Option<Instant>,
}

impl SerialPlatform {
    pub fn new() -> Self {
        Self {
            port: None,
            started_at: Instant::now(),
            deadline: None,
        }
    }

    /// Reads whatever is currently available, without blocking past
    /// [`POLL_INTERVAL`]. Returns `Ok(None)` on a plain read timeout,
    /// `Err` on a real transport failure (treated by the caller as
    /// disconnection).
    pub fn poll_read(&mut self) -> Result<Option<Vec<u8>>, std::io::Error> {
        let Some(port) = self.port.as_mut() else {
            return Ok(None);
        };
        let mut buf = [0u8; 512];
        match port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => Ok(Some(buf[..n].to_vec())),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether the armed timeout has elapsed; clears it if so.
    pub fn poll_timeout(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

impl Default for SerialPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SerialPlatform {
    fn connect(&mut self, path: &str) -> Result<(), ConnectionError> {
        let port = serialport::new(path, DEFAULT_BAUD)
            .timeout(POLL_INTERVAL)
            .open()
            .map_err(|_| ConnectionError::OpenFailed(path.to_string()))?;
        self.port = Some(port);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.port = None;
    }

    fn write(&mut self, bytes: &[u8]) {
        if let Some(port) = self.port.as_mut() {
            if let Err(e) = port.write_all(bytes) {
                log::warn!("write failed, treating as disconnect: {e}");
                self.port = None;
            }
        }
    }

    fn set_timeout(&mut self, ms: u64) {
        self.deadline = Some(Instant::now() + Duration::from_millis(ms));
    }

    fn clear_timeout(&mut self) {
        self.deadline = None;
    }

    fn time_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    fn reset_ftdi(&mut self) -> ResetOutcome {
        log::warn!("FTDI bit-bang reset is not implemented on this platform");
        ResetOutcome::Failed
    }

    fn reset_gpio(&mut self) -> ResetOutcome {
        log::warn!("GPIO reset is not implemented on this platform");
        ResetOutcome::Failed
    }

    fn enumerate_devices(&self) -> Vec<DeviceRecord> {
        serialport::available_ports()
            .unwrap_or_default()
            .into_iter()
            .map(|info| {
                let (name, serial) = match &info.port_type {
                    SerialPortType::UsbPort(usb) => (
                        usb.product.clone().unwrap_or_else(|| "USB serial".into()),
                        usb.serial_number.clone(),
                    ),
                    _ => ("serial device".to_string(), None),
                };
                DeviceRecord {
                    name,
                    serial,
                    path: info.port_name.clone(),
                    stable_path: None,
                }
            })
            .collect()
    }
}
