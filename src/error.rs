//! Error types returned by the flashing engine and its surrounding CLI.

use std::io;

use thiserror::Error;

/// Errors raised while parsing a GCF firmware container.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "std", derive(miette::Diagnostic))]
#[non_exhaustive]
pub enum GcfError {
    #[error("file is only {0} bytes, shorter than the 14-byte header")]
    #[cfg_attr(feature = "std", diagnostic(code(gcfflasher::gcf::too_short)))]
    TooShort(usize),

    #[error("filename does not contain a firmware version literal (expected a \"0x...\" token)")]
    #[cfg_attr(
        feature = "std",
        diagnostic(
            code(gcfflasher::gcf::no_version_in_name),
            help("rename the file so it contains the firmware version, e.g. `ConBee_II_0x26720700.bin.GCF`")
        )
    )]
    NoVersionInName,

    #[error("bad magic 0x{0:08X}, expected 0xCAFEFEED")]
    #[cfg_attr(
        feature = "std",
        diagnostic(
            code(gcfflasher::gcf::bad_magic),
            help("this does not look like a GCF container; check the file was not corrupted in transfer")
        )
    )]
    BadMagic(u32),

    #[error("header declares payload_size {declared}, but file has {actual} bytes of payload")]
    #[cfg_attr(feature = "std", diagnostic(code(gcfflasher::gcf::size_mismatch)))]
    SizeMismatch { declared: u32, actual: usize },
}

/// Errors originating in the serial transport layer.
#[derive(Debug, Error)]
#[cfg_attr(feature = "std", derive(miette::Diagnostic))]
#[non_exhaustive]
pub enum ConnectionError {
    #[error("failed to open serial port {0}")]
    #[cfg_attr(feature = "std", diagnostic(code(gcfflasher::connection::open_failed)))]
    OpenFailed(String),

    #[error("device disconnected unexpectedly")]
    #[cfg_attr(feature = "std", diagnostic(code(gcfflasher::connection::disconnected)))]
    Disconnected,

    #[error("hardware reset via {0} is not supported on this platform")]
    #[cfg_attr(feature = "std", diagnostic(code(gcfflasher::connection::reset_unsupported)))]
    ResetUnsupported(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Serial(#[from] serialport::Error),
}

/// Errors raised while driving the bootloader programming state machine.
#[derive(Debug, Error)]
#[cfg_attr(feature = "std", derive(miette::Diagnostic))]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    #[cfg_attr(feature = "std", diagnostic(transparent))]
    Gcf(#[from] GcfError),

    #[error(transparent)]
    #[cfg_attr(feature = "std", diagnostic(transparent))]
    Connection(#[from] ConnectionError),

    #[error("timed out waiting for a response in state {state}")]
    #[cfg_attr(
        feature = "std",
        diagnostic(
            code(gcfflasher::protocol::timeout),
            help("the device may be unresponsive; check the cable and that the bootloader is active")
        )
    )]
    ProtocolTimeout { state: &'static str },

    #[error("unexpected response in state {state}: {detail}")]
    #[cfg_attr(feature = "std", diagnostic(code(gcfflasher::protocol::mismatch)))]
    ProtocolMismatch { state: &'static str, detail: String },

    #[error("retry deadline exceeded")]
    #[cfg_attr(
        feature = "std",
        diagnostic(
            code(gcfflasher::deadline_exceeded),
            help("increase the retry deadline with -t, or check the connection")
        )
    )]
    DeadlineExceeded,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors raised while parsing or validating CLI arguments.
#[derive(Debug, Error)]
#[cfg_attr(feature = "std", derive(miette::Diagnostic))]
#[non_exhaustive]
pub enum CliError {
    #[error("-d/--device is required for this operation")]
    #[cfg_attr(feature = "std", diagnostic(code(gcfflasher::cli::missing_device)))]
    MissingDevice,

    #[error("-f/--file is required to program a device")]
    #[cfg_attr(feature = "std", diagnostic(code(gcfflasher::cli::missing_file)))]
    MissingFile,

    #[error("retry deadline must be between 0 and 3600 seconds, got {0}")]
    #[cfg_attr(feature = "std", diagnostic(code(gcfflasher::cli::bad_deadline)))]
    BadDeadline(u64),

    #[error(transparent)]
    #[cfg_attr(feature = "std", diagnostic(transparent))]
    Gcf(#[from] GcfError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
