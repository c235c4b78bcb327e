//! Static configuration and ordered setup plan
//!
//! Copyright 2019 Ryan Kurte

use crate::model::Model;

/// Auto cleaning interval default, one week
pub const DEFAULT_AUTO_CLEANING_INTERVAL_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// VOC / NOx gas index algorithm tuning parameters
/// These are volatile on the device and reapplied at every boot in idle mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasTuning {
    pub index_offset: i16,
    /// 12 by default, 720 for building standards
    pub learning_time_offset_hours: i16,
    pub learning_time_gain_hours: i16,
    pub gating_max_duration_minutes: i16,
    /// Only used by the VOC algorithm
    pub std_initial: i16,
    pub gain_factor: i16,
}

impl GasTuning {
    /// Datasheet defaults for the VOC algorithm
    pub fn voc_default() -> Self {
        GasTuning {
            index_offset: 100,
            learning_time_offset_hours: 12,
            learning_time_gain_hours: 12,
            gating_max_duration_minutes: 180,
            std_initial: 50,
            gain_factor: 230,
        }
    }

    /// Datasheet defaults for the NOx algorithm
    pub fn nox_default() -> Self {
        GasTuning {
            index_offset: 1,
            learning_time_offset_hours: 12,
            learning_time_gain_hours: 12,
            gating_max_duration_minutes: 720,
            std_initial: 50,
            gain_factor: 230,
        }
    }

    pub(crate) fn voc_words(&self) -> [u16; 6] {
        [
            self.index_offset as u16,
            self.learning_time_offset_hours as u16,
            self.learning_time_gain_hours as u16,
            self.gating_max_duration_minutes as u16,
            self.std_initial as u16,
            self.gain_factor as u16,
        ]
    }

    /// NOx omits the initial standard deviation
    pub(crate) fn nox_words(&self) -> [u16; 5] {
        [
            self.index_offset as u16,
            self.learning_time_offset_hours as u16,
            self.learning_time_gain_hours as u16,
            self.gating_max_duration_minutes as u16,
            self.gain_factor as u16,
        ]
    }
}

/// Temperature acceleration filter parameters, each scaled x10
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RhtAcceleration {
    pub k: u16,
    pub p: u16,
    pub t1: u16,
    pub t2: u16,
}

impl RhtAcceleration {
    pub(crate) fn words(&self) -> [u16; 4] {
        [self.k, self.p, self.t1, self.t2]
    }
}

/// Temperature compensation in device units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TemperatureCompensation {
    /// Offset, scaled x200 (°C)
    pub offset: i16,
    /// Normalized offset slope, scaled x10000
    pub normalized_offset_slope: i16,
    /// Time constant in seconds
    pub time_constant: u16,
}

/// All temperature offsets are written to slot 0
pub const TEMPERATURE_OFFSET_SLOT: u16 = 0;

impl TemperatureCompensation {
    pub fn new(offset: f32, normalized_offset_slope: f32, time_constant: u16) -> Self {
        TemperatureCompensation {
            offset: (offset * 200.0) as i16,
            normalized_offset_slope: (normalized_offset_slope * 10000.0) as i16,
            time_constant,
        }
    }

    /// Constant offset only, applied immediately
    pub fn offset_only(offset: f32) -> Self {
        Self::new(offset, 0.0, 0)
    }

    pub(crate) fn words(&self) -> [u16; 4] {
        [
            self.offset as u16,
            self.normalized_offset_slope as u16,
            self.time_constant,
            TEMPERATURE_OFFSET_SLOT,
        ]
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Model to use if the product name cannot be read
    pub model: Option<Model>,
    pub voc_tuning: Option<GasTuning>,
    pub nox_tuning: Option<GasTuning>,
    pub rht_acceleration: Option<RhtAcceleration>,
    /// Full temperature compensation, applied after the persisted offset
    pub temperature_compensation: Option<TemperatureCompensation>,
    /// Persist and restore the VOC algorithm state
    pub store_baseline: bool,
    pub auto_cleaning_interval_ms: u64,
    /// Read number concentrations on every poll
    pub number_concentration: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            model: None,
            voc_tuning: None,
            nox_tuning: None,
            rht_acceleration: None,
            temperature_compensation: None,
            store_baseline: true,
            auto_cleaning_interval_ms: DEFAULT_AUTO_CLEANING_INTERVAL_MS,
            number_concentration: false,
        }
    }
}

/// Configuration phase relative to Start Measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Idle mode, before measurement is started
    PreStart,
    /// Measurement mode, after measurement is started
    PostStart,
}

/// Individual setup operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupItem {
    Identity,
    VocTuning,
    NoxTuning,
    RhtAcceleration,
    VocBaseline,
    AutoSelfCalibration,
    Altitude,
    AmbientPressure,
    TemperatureOffset,
    TemperatureCompensation,
    Co2Reference,
    AutoCleaning,
}

impl SetupItem {
    pub fn phase(&self) -> Phase {
        use SetupItem::*;

        match self {
            Identity | VocTuning | NoxTuning | RhtAcceleration
                | VocBaseline | AutoSelfCalibration | Altitude => Phase::PreStart,
            AmbientPressure | TemperatureOffset | TemperatureCompensation
                | Co2Reference | AutoCleaning => Phase::PostStart,
        }
    }
}

/// Setup order, items are applied in sequence within their phase
pub const SETUP_ORDER: [SetupItem; 12] = [
    SetupItem::Identity,
    SetupItem::VocTuning,
    SetupItem::NoxTuning,
    SetupItem::RhtAcceleration,
    SetupItem::VocBaseline,
    SetupItem::AutoSelfCalibration,
    SetupItem::Altitude,
    SetupItem::AmbientPressure,
    SetupItem::TemperatureOffset,
    SetupItem::TemperatureCompensation,
    SetupItem::Co2Reference,
    SetupItem::AutoCleaning,
];

/// Setup items for a phase, in order
pub fn setup_items(phase: Phase) -> impl Iterator<Item = SetupItem> {
    SETUP_ORDER.iter().copied().filter(move |i| i.phase() == phase)
}
