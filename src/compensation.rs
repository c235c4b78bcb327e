//! Boot-time reconciliation of compensation values
//!
//! The device forgets altitude on power cycle (reporting 0) so a persisted
//! value is authoritative whenever one exists. Without one, the device value
//! is adopted as-is.
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

use crate::{Error, Sen6x};
use crate::store::{PreferenceKey, Preferences, Store};

/// Default outdoor CO2 reference, ppm
pub const DEFAULT_CO2_REFERENCE: f32 = 400.0;

/// Accepted ambient pressure range, hPa
pub const PRESSURE_MIN_HPA: f32 = 700.0;
pub const PRESSURE_MAX_HPA: f32 = 1200.0;

/// Accepted sensor altitude range, meters
pub const ALTITUDE_MAX_M: f32 = 3000.0;

/// Largest temperature offset representable in device units (x200 in an i16)
pub const TEMPERATURE_OFFSET_MAX: f32 = i16::MAX as f32 / 200.0;

/// Operative compensation values
#[derive(Debug, Clone, PartialEq)]
pub struct Compensation {
    /// Sensor altitude in meters
    pub altitude: Option<f32>,
    /// Ambient pressure in hPa
    pub ambient_pressure: Option<f32>,
    /// Temperature offset in degrees celsius
    pub temperature_offset: Option<f32>,
    /// Outdoor CO2 reference, also the default forced recalibration target
    pub co2_reference: f32,
    pub auto_self_calibration: bool,
    pub auto_cleaning: bool,
}

impl Default for Compensation {
    fn default() -> Self {
        Compensation {
            altitude: None,
            ambient_pressure: None,
            temperature_offset: None,
            co2_reference: DEFAULT_CO2_REFERENCE,
            auto_self_calibration: true,
            auto_cleaning: false,
        }
    }
}

/// Compensation values shared between the store and the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationValue {
    Altitude,
    AmbientPressure,
    TemperatureOffset,
}

impl CompensationValue {
    pub fn key(&self) -> PreferenceKey {
        match self {
            CompensationValue::Altitude => PreferenceKey::Altitude,
            CompensationValue::AmbientPressure => PreferenceKey::AmbientPressure,
            CompensationValue::TemperatureOffset => PreferenceKey::TemperatureOffset,
        }
    }

    /// Whether the value is only meaningful for CO2 compensation
    pub fn co2_only(&self) -> bool {
        *self != CompensationValue::TemperatureOffset
    }

    pub fn in_range(&self, v: f32) -> bool {
        match self {
            CompensationValue::Altitude => (0.0..=ALTITUDE_MAX_M).contains(&v),
            CompensationValue::AmbientPressure => (PRESSURE_MIN_HPA..=PRESSURE_MAX_HPA).contains(&v),
            CompensationValue::TemperatureOffset => v.is_finite() && v.abs() <= TEMPERATURE_OFFSET_MAX,
        }
    }

    /// Slot for this value in the operative set
    pub fn get_mut<'a>(&self, c: &'a mut Compensation) -> &'a mut Option<f32> {
        match self {
            CompensationValue::Altitude => &mut c.altitude,
            CompensationValue::AmbientPressure => &mut c.ambient_pressure,
            CompensationValue::TemperatureOffset => &mut c.temperature_offset,
        }
    }
}

/// Where a reconciled value came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Source {
    /// Persisted value written to the device
    Persisted,
    /// Read from the device, no write issued
    Device,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciled {
    pub value: f32,
    pub source: Source,
}

impl <Conn, Delay, Err> Sen6x<Conn, Delay, Err> where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Delay: DelayMs<u32>,
    Err: Debug,
{
    /// Write a compensation value in engineering units
    pub fn write_compensation(&mut self, value: CompensationValue, v: f32) -> Result<(), Error<Err>> {
        match value {
            CompensationValue::Altitude => self.set_sensor_altitude(v.round() as u16),
            CompensationValue::AmbientPressure => self.set_ambient_pressure(v.round() as u16),
            CompensationValue::TemperatureOffset => self.set_temperature_offset(v),
        }
    }

    /// Read a compensation value in engineering units
    pub fn read_compensation(&mut self, value: CompensationValue) -> Result<f32, Error<Err>> {
        match value {
            CompensationValue::Altitude => self.sensor_altitude().map(|v| v as f32),
            CompensationValue::AmbientPressure => self.ambient_pressure().map(|v| v as f32),
            CompensationValue::TemperatureOffset => self.temperature_offset(),
        }
    }
}

/// Reconcile one compensation value between the store and the device
///
/// A persisted, non-NaN value is written to the device. Altitude is then read
/// back and the device's answer becomes the operative value. Otherwise the
/// device value is read and adopted without writing.
pub fn reconcile<Conn, Delay, Err, S>(
    sensor: &mut Sen6x<Conn, Delay, Err>,
    prefs: &mut Preferences<S>,
    value: CompensationValue,
) -> Result<Reconciled, Error<Err>> where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Delay: DelayMs<u32>,
    Err: Debug,
    S: Store,
{
    let persisted = match prefs.load_value(value.key()) {
        Some(v) => v,
        None => {
            info!("No persisted {:?}, reading from device", value);

            let v = sensor.read_compensation(value)?;
            debug!("Device reports {:?}: {:.2}", value, v);

            return Ok(Reconciled{ value: v, source: Source::Device });
        }
    };

    info!("Applying persisted {:?}: {:.2}", value, persisted);
    sensor.write_compensation(value, persisted)?;

    if value != CompensationValue::Altitude {
        return Ok(Reconciled{ value: persisted, source: Source::Persisted });
    }

    let verified = match sensor.read_compensation(value) {
        Ok(v) => {
            info!("Altitude verification: sensor reports {:.1} m", v);
            v
        },
        Err(e) => {
            warn!("Altitude verification read failed: {:?}", e);
            persisted
        }
    };

    Ok(Reconciled{ value: verified, source: Source::Persisted })
}
