//! Sen6x device status register
//!
//! Copyright 2019 Ryan Kurte

use core::fmt;

const FAN_SPEED_WARNING: u32 = 1 << 21;
const RHT_ERROR: u32 = 1 << 20;
const GAS_ERROR: u32 = 1 << 19;
const PM_ERROR: u32 = 1 << 18;
const LASER_ERROR: u32 = 1 << 17;

const FAULTS: u32 = FAN_SPEED_WARNING | RHT_ERROR | GAS_ERROR | PM_ERROR | LASER_ERROR;

/// Raw 32-bit device status, read from two words (high word first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceStatus(pub u32);

impl DeviceStatus {
    pub fn from_words(words: [u16; 2]) -> Self {
        DeviceStatus((words[0] as u32) << 16 | words[1] as u32)
    }

    /// Fan error, reported from the fan speed warning flag
    pub fn fan_error(&self) -> bool {
        self.0 & FAN_SPEED_WARNING != 0
    }

    pub fn fan_warning(&self) -> bool {
        self.0 & FAN_SPEED_WARNING != 0
    }

    pub fn rht_error(&self) -> bool {
        self.0 & RHT_ERROR != 0
    }

    pub fn gas_error(&self) -> bool {
        self.0 & GAS_ERROR != 0
    }

    pub fn pm_error(&self) -> bool {
        self.0 & PM_ERROR != 0
    }

    pub fn laser_error(&self) -> bool {
        self.0 & LASER_ERROR != 0
    }

    /// Any of the known fault flags set
    pub fn has_fault(&self) -> bool {
        self.0 & FAULTS != 0
    }

    /// Log set fault flags
    pub(crate) fn log_faults(&self) {
        if self.fan_warning() {
            warn!("Status: Fan speed warning");
        }
        if self.rht_error() {
            warn!("Status: RHT error");
        }
        if self.gas_error() {
            warn!("Status: Gas error");
        }
        if self.pm_error() {
            warn!("Status: PM error");
        }
        if self.laser_error() {
            warn!("Status: Laser error");
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_words() {
        let s = DeviceStatus::from_words([0x0024, 0x0010]);
        assert_eq!(s.0, 0x0024_0010);
        assert_eq!(format!("{}", s), "0x00240010");
    }

    #[test]
    fn test_flags() {
        let s = DeviceStatus(1 << 21 | 1 << 18);
        assert!(s.fan_warning() && s.fan_error());
        assert!(s.pm_error());
        assert!(!s.gas_error() && !s.rht_error() && !s.laser_error());
        assert!(s.has_fault());

        assert!(!DeviceStatus(0).has_fault());
        // Unmapped bits are not faults
        assert!(!DeviceStatus(1 << 4).has_fault());
    }
}
