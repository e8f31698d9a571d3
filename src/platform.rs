//! The external-collaborator boundary the engine runs against: serial I/O,
//! timers, hardware reset primitives, the clock, and device enumeration.
//! A real implementation lives in [`crate::serial_platform`]; tests drive
//! the engine against [`MockPlatform`].

use crate::device::DeviceRecord;
use crate::error::ConnectionError;

/// Outcome a hardware-specific reset attempt can report. Distinct from
/// `Result` because "the call succeeded but we have no way to confirm the
/// device actually reset" is itself meaningful to the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Success,
    Failed,
}

/// Everything the flashing engine needs from its environment. Implementors
/// own the serial port and are responsible for calling
/// [`crate::engine::Engine::on_bytes_received`] and
/// [`crate::engine::Engine::handle_event`] as I/O and timers occur.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
pub trait Platform {
    /// Opens the serial connection to `path`.
    fn connect(&mut self, path: &str) -> Result<(), ConnectionError>;

    /// Closes the serial connection, if open.
    fn disconnect(&mut self);

    /// Best-effort write; failure surfaces later as a `Disconnected` event
    /// rather than as an error return, matching the engine's event-driven
    /// model.
    fn write(&mut self, bytes: &[u8]);

    /// Arms a single pending timeout, replacing any previously-armed one.
    fn set_timeout(&mut self, ms: u64);

    /// Cancels the pending timeout, if any.
    fn clear_timeout(&mut self);

    /// Monotonic milliseconds since an arbitrary epoch.
    fn time_ms(&self) -> u64;

    /// Drives an FTDI bit-bang reset sequence (ConBee I).
    fn reset_ftdi(&mut self) -> ResetOutcome;

    /// Drives a GPIO reset sequence (RaspBee I/II).
    fn reset_gpio(&mut self) -> ResetOutcome;

    /// Enumerates serial ports that look like candidate devices.
    fn enumerate_devices(&self) -> Vec<DeviceRecord>;
}
