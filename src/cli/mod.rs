//! Translates parsed CLI arguments into a validated [`Task`] plus the
//! parameters the engine needs, mirroring the original flasher's argument
//! validation (required device for reset/program, RaspBee1→RaspBee2
//! refinement, default programming deadline).

pub mod clap;

use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::engine::{reset, SubState, Task};
use crate::error::CliError;
use crate::gcf::GcfFile;

pub use self::clap::Args;

const DEFAULT_PROGRAM_TIMEOUT_SECS: u64 = 10;
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Everything the engine needs to start a run, already validated.
#[derive(Debug)]
pub struct Plan {
    pub task: Task,
    pub device_path: String,
    pub file: Option<GcfFile>,
    pub timeout_secs: u64,
    pub preferred_reset: Option<SubState>,
}

/// Resolves `args` (plus a loaded [`Config`] for fallback defaults) into a
/// validated [`Plan`], or an error the CLI should report and exit on.
pub fn plan_from_args(args: Args, config: &Config) -> Result<Plan, CliError> {
    let timeout_secs = resolve_timeout(&args, config)?;
    let preferred_reset = config
        .preferred_reset
        .as_deref()
        .and_then(reset::preference_from_str);

    if args.list {
        return Ok(Plan {
            task: Task::ListDevices,
            device_path: String::new(),
            file: None,
            timeout_secs,
            preferred_reset,
        });
    }

    let device_path = args
        .device
        .clone()
        .or_else(|| config.default_port.clone())
        .ok_or(CliError::MissingDevice)?;

    if args.reset {
        return Ok(Plan {
            task: Task::Reset,
            device_path,
            file: None,
            timeout_secs,
            preferred_reset,
        });
    }

    if let Some(path) = &args.file {
        let file = load_gcf_file(path)?;
        return Ok(Plan {
            task: Task::Program,
            device_path,
            file: Some(file),
            timeout_secs,
            preferred_reset,
        });
    }

    if args.connect {
        return Ok(Plan {
            task: Task::Connect,
            device_path,
            file: None,
            timeout_secs,
            preferred_reset,
        });
    }

    Err(CliError::MissingFile)
}

fn resolve_timeout(args: &Args, config: &Config) -> Result<u64, CliError> {
    let timeout = args
        .timeout
        .or(config.default_timeout_secs)
        .unwrap_or(if args.file.is_some() {
            DEFAULT_PROGRAM_TIMEOUT_SECS
        } else {
            0
        });
    if timeout > MAX_TIMEOUT_SECS {
        return Err(CliError::BadDeadline(timeout));
    }
    Ok(timeout)
}

fn load_gcf_file(path: &PathBuf) -> Result<GcfFile, CliError> {
    let content = fs::read(path)?;
    Ok(GcfFile::parse(path, content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(reset: bool, file: Option<PathBuf>, device: Option<&str>) -> Args {
        Args {
            reset,
            file,
            device: device.map(String::from),
            connect: false,
            timeout: None,
            list: false,
            verbose: 0,
        }
    }

    #[test]
    fn reset_without_device_is_an_error() {
        let err = plan_from_args(args(true, None, None), &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::MissingDevice));
    }

    #[test]
    fn reset_with_device_succeeds() {
        let plan = plan_from_args(args(true, None, Some("/dev/ttyACM0")), &Config::default()).unwrap();
        assert!(matches!(plan.task, Task::Reset));
        assert_eq!(plan.device_path, "/dev/ttyACM0");
    }

    #[test]
    fn list_never_requires_a_device() {
        let mut a = args(false, None, None);
        a.list = true;
        let plan = plan_from_args(a, &Config::default()).unwrap();
        assert!(matches!(plan.task, Task::ListDevices));
    }

    #[test]
    fn program_without_file_or_reset_or_connect_is_an_error() {
        let err = plan_from_args(args(false, None, Some("/dev/ttyACM0")), &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::MissingFile));
    }

    #[test]
    fn timeout_over_max_is_rejected() {
        let mut a = args(true, None, Some("/dev/ttyACM0"));
        a.timeout = Some(3601);
        let err = plan_from_args(a, &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::BadDeadline(3601)));
    }
}
