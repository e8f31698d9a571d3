//! Device kind classification and the device records surfaced by the list
//! task.

/// Hardware revision the flasher is talking to, inferred from the serial
/// path and, for RaspBee1 vs RaspBee2, refined from the firmware file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceKind {
    Unknown,
    RaspBee1,
    RaspBee2,
    ConBee1,
    ConBee2,
}

impl DeviceKind {
    /// Classifies a device from its serial path using the same substring
    /// heuristics as the legacy flasher: `ttyACM*` is a ConBee II, a
    /// `ttyUSB*`/`usb-FTDI*` path is a ConBee I behind an FTDI adapter, and
    /// `ttyAMA*`/`ttyS*` is a RaspBee on a UART header.
    pub fn from_path(path: &str) -> Self {
        if path.contains("ttyACM") {
            DeviceKind::ConBee2
        } else if path.contains("ttyUSB") || path.contains("usb-FTDI") {
            DeviceKind::ConBee1
        } else if path.contains("ttyAMA") || path.contains("ttyS") {
            DeviceKind::RaspBee1
        } else {
            DeviceKind::Unknown
        }
    }

    /// Refines a `RaspBee1` classification into `RaspBee2` when the
    /// firmware's platform byte (bits 8-15 of the version word) identifies
    /// the newer radio module.
    pub fn refine_with_fw_version(self, fw_version: u32) -> Self {
        const PLATFORM_R21: u32 = 0x0000_0700;
        if self == DeviceKind::RaspBee1 && (fw_version & 0x0000_FF00) == PLATFORM_R21 {
            DeviceKind::RaspBee2
        } else {
            self
        }
    }

    pub fn uses_ftdi_reset(self) -> bool {
        matches!(self, DeviceKind::ConBee1)
    }

    pub fn uses_gpio_reset(self) -> bool {
        matches!(self, DeviceKind::RaspBee1 | DeviceKind::RaspBee2)
    }
}

/// One entry reported by the list task.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub name: String,
    pub serial: Option<String>,
    pub path: String,
    pub stable_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_conbee2_from_ttyacm() {
        assert_eq!(DeviceKind::from_path("/dev/ttyACM0"), DeviceKind::ConBee2);
    }

    #[test]
    fn classifies_conbee1_from_ttyusb_or_ftdi_path() {
        assert_eq!(DeviceKind::from_path("/dev/ttyUSB0"), DeviceKind::ConBee1);
        assert_eq!(
            DeviceKind::from_path("/dev/serial/by-id/usb-FTDI_FT230X-if00-port0"),
            DeviceKind::ConBee1
        );
    }

    #[test]
    fn classifies_raspbee_from_ttyama_or_ttys() {
        assert_eq!(DeviceKind::from_path("/dev/ttyAMA0"), DeviceKind::RaspBee1);
        assert_eq!(DeviceKind::from_path("/dev/ttyS0"), DeviceKind::RaspBee1);
    }

    #[test]
    fn unknown_path_falls_through() {
        assert_eq!(DeviceKind::from_path("/dev/null"), DeviceKind::Unknown);
    }

    #[test]
    fn refines_raspbee1_to_raspbee2_on_r21_platform_byte() {
        let refined = DeviceKind::RaspBee1.refine_with_fw_version(0x2672_0700);
        assert_eq!(refined, DeviceKind::RaspBee2);
    }

    #[test]
    fn does_not_refine_other_kinds() {
        let refined = DeviceKind::ConBee1.refine_with_fw_version(0x2672_0700);
        assert_eq!(refined, DeviceKind::ConBee1);
    }
}
