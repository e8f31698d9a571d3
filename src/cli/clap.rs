//! Argument definitions for the `gcfflasher` binary.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "gcfflasher", version, about = "Program GCF firmware onto a radio coprocessor module")]
pub struct Args {
    /// Reset the device and exit
    #[arg(short = 'r', long)]
    pub reset: bool,

    /// Path to the GCF firmware file to program
    #[arg(short = 'f', long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Serial device path, e.g. /dev/ttyACM0
    #[arg(short = 'd', long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Connect to the device and log traffic without programming
    #[arg(short = 'c', long)]
    pub connect: bool,

    /// Retry deadline in seconds (0-3600)
    #[arg(short = 't', long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// List candidate serial devices and exit
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
