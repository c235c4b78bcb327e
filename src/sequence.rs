//! Timed maintenance sequences
//!
//! Long device operations are modelled as a pending [`Step`] with a deadline
//! rather than as blocking waits. The controller drives them from `tick`.
//!
//! Copyright 2019 Ryan Kurte

use crate::Error;

/// Device operating mode as tracked by software
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Power-on state, the device may or may not be measuring
    Unknown,
    /// Stop Measurement issued, idle-only commands are accepted from `ready_at`
    Stopping { ready_at: u64 },
    Idle,
    Measuring,
}

/// User visible operations, reported in [`Outcome`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Setup,
    SetAltitude,
    SetAutoSelfCalibration,
    ForcedRecalibration,
    Co2FactoryReset,
    ActivateHeater,
    FanCleaning,
    DeviceReset,
}

/// Next action of a sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Ordered boot configuration and Start Measurement
    Setup,
    /// Setup after a device reset, reported as [`Operation::DeviceReset`]
    Reboot,
    WriteAltitude(f32),
    WriteAutoSelfCalibration(bool),
    /// Write the reference concentration in ppm
    ForcedRecalibration(u16),
    /// Fetch the recalibration correction
    ReadRecalibration,
    Co2FactoryReset,
    ActivateHeater,
    StartFanCleaning,
    /// Execution time has elapsed, restart measurement and report
    Resume(Operation),
    /// Retry a failed Start Measurement
    Restart,
}

/// Sequence in flight, at most one at a time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sequence {
    Idle,
    /// Waiting for the device to become idle after Stop Measurement
    AwaitingSettle { resume_at: u64, next: Step },
    /// Waiting for a device operation to complete
    AwaitingExecution { resume_at: u64, next: Step },
}

impl Default for Sequence {
    fn default() -> Self {
        Sequence::Idle
    }
}

impl Sequence {
    pub fn is_active(&self) -> bool {
        *self != Sequence::Idle
    }

    pub fn resume_at(&self) -> Option<u64> {
        match self {
            Sequence::Idle => None,
            Sequence::AwaitingSettle{ resume_at, .. } | Sequence::AwaitingExecution{ resume_at, .. } => Some(*resume_at),
        }
    }

    /// Take the pending step if its deadline has passed
    pub fn take_due(&mut self, now: u64) -> Option<Step> {
        let step = match *self {
            Sequence::AwaitingSettle{ resume_at, next } | Sequence::AwaitingExecution{ resume_at, next }
                if now >= resume_at => next,
            _ => return None,
        };

        *self = Sequence::Idle;
        Some(step)
    }
}

/// Result of a completed sequence
#[derive(Debug)]
pub enum Outcome<E> {
    Completed(Operation),
    /// Forced recalibration accepted, the correction is informational
    Recalibrated { correction_ppm: i16 },
    /// The operation failed, measurement has been restarted regardless
    Failed(Operation, Error<E>),
}

impl <E> Outcome<E> {
    pub fn operation(&self) -> Operation {
        match self {
            Outcome::Completed(op) | Outcome::Failed(op, _) => *op,
            Outcome::Recalibrated{ .. } => Operation::ForcedRecalibration,
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Outcome::Failed(..))
    }
}
