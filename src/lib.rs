//! Sen6x environmental sensor module driver
//!
//! Supports the SEN62, SEN63C, SEN65, SEN66, SEN68 and SEN69C variants over I2C.
//! [`Sen6x`] exposes the device commands directly, [`Controller`] runs the
//! setup, calibration and maintenance sequences and keeps persisted state in
//! sync with the device.
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::{self, Debug};
use core::marker::PhantomData;

#[macro_use]
extern crate log;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

pub mod base;
pub mod baseline;
pub mod compensation;
pub mod config;
pub mod controller;
pub mod device;
pub mod measurement;
pub mod model;
pub mod physics;
pub mod sequence;
pub mod status;
pub mod store;

#[cfg(test)]
mod test_utils;

use base::Base;
use device::*;

pub use baseline::Baseline;
pub use config::{Config, GasTuning, RhtAcceleration, TemperatureCompensation};
pub use controller::{Controller, Reading};
pub use measurement::{Measurement, NumberConcentration};
pub use model::Model;
pub use physics::Tvoc;
pub use sequence::{Mode, Operation, Outcome};
pub use status::DeviceStatus;
pub use store::{MemoryStore, Store};

/// Sen6x sensor object
/// This is generic over an I2C connector, a blocking delay and the associated error type
pub struct Sen6x<Conn, Delay, Err> {
    conn: Conn,
    delay: Delay,
    _err: PhantomData<Err>,
}

/// Sen6x error object
#[derive(Debug, thiserror::Error)]
pub enum Error<ConnErr> {
    #[error("transport error: {0:?}")]
    Transport(ConnErr),
    #[error("CRC mismatch in response word {word}")]
    Crc { word: usize },
    #[error("sensor not yet stable")]
    NotStable,
    #[error("calibration rejected by the sensor")]
    CalibrationRejected,
    #[error("{feature} is not supported on {model}")]
    UnsupportedOnModel { model: Model, feature: &'static str },
    #[error("a maintenance sequence is in progress")]
    Busy,
    #[error("value out of range")]
    OutOfRange,
    #[error("measurement is not running")]
    NotRunning,
}

/// Firmware version, major and minor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Parse a NUL terminated ASCII identity buffer
fn identity_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}

impl <Conn, Delay, Err> Sen6x<Conn, Delay, Err> where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Delay: DelayMs<u32>,
    Err: Debug,
{
    /// Create a new Sen6x sensor instance
    /// No bus traffic is generated until a command is issued
    pub fn new(conn: Conn, delay: Delay) -> Self {
        Sen6x{ conn, delay, _err: PhantomData }
    }

    /// Write a configuration value and hold the bus for the post-write spacing
    fn write_config(&mut self, command: Command, data: &[u16]) -> Result<(), Error<Err>> {
        self.write_command_with_words(command, data)?;
        self.delay.delay_ms(WRITE_SPACING_MS);
        Ok(())
    }

    fn read_word(&mut self, command: Command) -> Result<u16, Error<Err>> {
        let mut w = [0u16; 1];
        self.read_words(command, &mut w)?;
        Ok(w[0])
    }

    /// Start continuous measurement
    pub fn start_measurement(&mut self) -> Result<(), Error<Err>> {
        self.write_command(Command::StartMeasurement)
    }

    /// Stop continuous measurement
    /// The device is not idle until [`STOP_SETTLE_MS`] later
    pub fn stop_measurement(&mut self) -> Result<(), Error<Err>> {
        self.write_command(Command::StopMeasurement)
    }

    /// Check whether measurement data is available in the buffer
    pub fn data_ready(&mut self) -> Result<bool, Error<Err>> {
        let v = self.read_word(Command::GetDataReady)?;
        Ok(v & 0x00FF != 0)
    }

    /// Read the raw measured values frame for a variant
    pub fn read_measured_words(&mut self, model: Model) -> Result<Vec<u16>, Error<Err>> {
        let info = model.info();
        let mut words = vec![0u16; info.word_count];
        self.read_words(info.read_command, &mut words)?;
        Ok(words)
    }

    /// Read and decode measured values for a variant
    pub fn read_measured_values(&mut self, model: Model) -> Result<Measurement, Error<Err>> {
        let words = self.read_measured_words(model)?;
        measurement::decode(model, &words).ok_or(Error::NotStable)
    }

    /// Read particle number concentrations
    pub fn number_concentration(&mut self) -> Result<NumberConcentration, Error<Err>> {
        let mut w = [0u16; 5];
        self.read_words(Command::ReadNumberConcentration, &mut w)?;
        Ok(NumberConcentration::from_words(w))
    }

    pub fn device_status(&mut self) -> Result<DeviceStatus, Error<Err>> {
        let mut w = [0u16; 2];
        self.read_words(Command::ReadDeviceStatus, &mut w)?;
        Ok(DeviceStatus::from_words(w))
    }

    /// Read the device status and clear latched flags, returns the status prior to clearing
    pub fn read_and_clear_device_status(&mut self) -> Result<DeviceStatus, Error<Err>> {
        let mut w = [0u16; 2];
        self.read_words(Command::ReadAndClearDeviceStatus, &mut w)?;
        Ok(DeviceStatus::from_words(w))
    }

    pub fn product_name(&mut self) -> Result<String, Error<Err>> {
        let mut b = [0u8; IDENTITY_LEN];
        self.read_bytes(Command::GetProductName, &mut b)?;
        Ok(identity_string(&b))
    }

    pub fn serial_number(&mut self) -> Result<String, Error<Err>> {
        let mut b = [0u8; IDENTITY_LEN];
        self.read_bytes(Command::GetSerialNumber, &mut b)?;
        Ok(identity_string(&b))
    }

    pub fn firmware_version(&mut self) -> Result<FirmwareVersion, Error<Err>> {
        let v = self.read_word(Command::GetVersion)?;
        Ok(FirmwareVersion{ major: (v >> 8) as u8, minor: v as u8 })
    }

    /// Set altitude compensation in meters above sea level, idle mode only
    pub fn set_sensor_altitude(&mut self, altitude: u16) -> Result<(), Error<Err>> {
        self.write_config(Command::SensorAltitude, &[altitude])
    }

    pub fn sensor_altitude(&mut self) -> Result<u16, Error<Err>> {
        self.read_word(Command::SensorAltitude)
    }

    /// Set ambient pressure compensation in hPa
    pub fn set_ambient_pressure(&mut self, pressure: u16) -> Result<(), Error<Err>> {
        self.write_config(Command::AmbientPressure, &[pressure])
    }

    pub fn ambient_pressure(&mut self) -> Result<u16, Error<Err>> {
        self.read_word(Command::AmbientPressure)
    }

    /// Set a constant temperature offset in degrees celsius
    pub fn set_temperature_offset(&mut self, offset: f32) -> Result<(), Error<Err>> {
        self.set_temperature_compensation(&TemperatureCompensation::offset_only(offset))
    }

    /// Set full temperature compensation parameters
    pub fn set_temperature_compensation(&mut self, comp: &TemperatureCompensation) -> Result<(), Error<Err>> {
        self.write_config(Command::TemperatureOffset, &comp.words())
    }

    /// Read the temperature offset in degrees celsius
    pub fn temperature_offset(&mut self) -> Result<f32, Error<Err>> {
        let v = self.read_word(Command::TemperatureOffset)?;
        Ok(v as i16 as f32 / 200.0)
    }

    /// Set VOC algorithm tuning, idle mode only
    pub fn set_voc_tuning(&mut self, tuning: &GasTuning) -> Result<(), Error<Err>> {
        self.write_config(Command::VocTuning, &tuning.voc_words())
    }

    /// Set NOx algorithm tuning, idle mode only
    pub fn set_nox_tuning(&mut self, tuning: &GasTuning) -> Result<(), Error<Err>> {
        self.write_config(Command::NoxTuning, &tuning.nox_words())
    }

    /// Set temperature acceleration parameters, idle mode only
    pub fn set_rht_acceleration(&mut self, params: &RhtAcceleration) -> Result<(), Error<Err>> {
        self.write_config(Command::RhtAcceleration, &params.words())
    }

    /// Enable or disable CO2 automatic self calibration, idle mode only
    pub fn set_auto_self_calibration(&mut self, enabled: bool) -> Result<(), Error<Err>> {
        self.write_config(Command::Co2AutomaticSelfCalibration, &[enabled as u16])
    }

    pub fn auto_self_calibration(&mut self) -> Result<bool, Error<Err>> {
        let v = self.read_word(Command::Co2AutomaticSelfCalibration)?;
        Ok(v & 0x00FF != 0)
    }

    /// Issue a forced recalibration against a reference CO2 concentration, idle mode only
    /// The result is available [`FRC_EXECUTION_MS`] later via [`Sen6x::read_forced_recalibration`]
    pub fn start_forced_recalibration(&mut self, reference_ppm: u16) -> Result<(), Error<Err>> {
        self.write_command_with_word(Command::ForcedCo2Recalibration, reference_ppm)
    }

    /// Fetch the result of a forced recalibration, returning the applied correction in ppm
    pub fn read_forced_recalibration(&mut self) -> Result<i16, Error<Err>> {
        let mut w = [0u16; 1];
        self.read_response(&mut w)?;

        if w[0] == FRC_FAILED {
            return Err(Error::CalibrationRejected);
        }

        Ok(w[0].wrapping_sub(FRC_CORRECTION_OFFSET) as i16)
    }

    /// Reset the CO2 sensor calibration history, idle mode only
    pub fn co2_factory_reset(&mut self) -> Result<(), Error<Err>> {
        self.write_command(Command::Co2FactoryReset)
    }

    /// Start a fan cleaning cycle, idle mode only
    pub fn start_fan_cleaning(&mut self) -> Result<(), Error<Err>> {
        self.write_command(Command::StartFanCleaning)
    }

    /// Activate the SHT heater, idle mode only
    pub fn activate_heater(&mut self) -> Result<(), Error<Err>> {
        self.write_command(Command::ActivateShtHeater)
    }

    /// Reset the device, equivalent to a power cycle
    pub fn device_reset(&mut self) -> Result<(), Error<Err>> {
        self.write_command(Command::DeviceReset)
    }

    /// Read the VOC algorithm state, measurement mode only
    pub fn voc_algorithm_state(&mut self) -> Result<Baseline, Error<Err>> {
        let mut w = [0u16; 4];
        self.read_words(Command::VocAlgorithmState, &mut w)?;
        Ok(Baseline::from_words(w))
    }

    /// Restore the VOC algorithm state, idle mode only
    pub fn set_voc_algorithm_state(&mut self, state: &Baseline) -> Result<(), Error<Err>> {
        self.write_config(Command::VocAlgorithmState, &state.words())
    }
}

#[cfg(test)]
mod test {
    use assert_approx_eq::assert_approx_eq;

    use crate::test_utils::*;
    use super::*;

    use embedded_hal_mock::eh0::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    #[test]
    fn test_start_measurement() {
        // Set up expectations
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0x00, 0x21]),
        ];
        let mut i2c = I2cMock::new(&expectations);

        // Create sensor object
        let mut sensor = mock_sensor(&i2c);

        sensor.start_measurement().unwrap();

        // Finalize expectations
        i2c.done();
    }

    #[test]
    fn test_stop_measurement() {
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0x01, 0x04]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        sensor.stop_measurement().unwrap();

        i2c.done();
    }

    #[test]
    fn test_set_altitude() {
        // 1000m
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0x67, 0x36, 0x03, 0xE8, 0xD4]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        sensor.set_sensor_altitude(1000).unwrap();

        i2c.done();
    }

    #[test]
    fn test_set_auto_self_calibration() {
        let expectations = [
            command_with(Command::Co2AutomaticSelfCalibration, &[0x0000]),
            command_with(Command::Co2AutomaticSelfCalibration, &[0x0001]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        sensor.set_auto_self_calibration(false).unwrap();
        sensor.set_auto_self_calibration(true).unwrap();

        i2c.done();
    }

    #[test]
    fn test_set_temperature_offset() {
        // 2.5C -> 500, slot 0
        let expectations = [
            command_with(Command::TemperatureOffset, &[500, 0, 0, 0]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        sensor.set_temperature_offset(2.5).unwrap();

        i2c.done();
    }

    #[test]
    fn test_read_temperature_offset() {
        let expectations = read(Command::TemperatureOffset, &[(-300i16) as u16]);
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        assert_approx_eq!(sensor.temperature_offset().unwrap(), -1.5);

        i2c.done();
    }

    #[test]
    fn test_set_nox_tuning_omits_std_initial() {
        let expectations = [
            command_with(Command::NoxTuning, &[1, 12, 12, 720, 230]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        sensor.set_nox_tuning(&GasTuning::nox_default()).unwrap();

        i2c.done();
    }

    #[test]
    fn test_read_data_ready() {
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0x02, 0x02]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x00, 0x01, 0xB0]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        let ready = sensor.data_ready().unwrap();
        assert!(ready);

        i2c.done();
    }

    #[test]
    fn test_read_measured_values_sen66() {
        let mut expectations = read(Command::ReadMeasuredValuesSen66,
            &[12, 34, 56, 78, 4567, 4700, 1000, 15, 455]);
        expectations.extend(read(Command::ReadMeasuredValuesSen66,
            &[0xFFFF, 34, 56, 78, 4567, 4700, 1000, 15, 455]));
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        let m = sensor.read_measured_values(Model::Sen66).unwrap();
        assert_approx_eq!(m.pm2_5, 3.4);
        assert_approx_eq!(m.temperature, 23.5);
        assert_eq!(m.co2, Some(455));

        match sensor.read_measured_values(Model::Sen66) {
            Err(Error::NotStable) => (),
            r => panic!("Unexpected result: {:?}", r),
        }

        i2c.done();
    }

    #[test]
    fn test_crc_error_discards_response() {
        let expectations = [
            command(Command::ReadDeviceStatus),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x00, 0x20, 0x08, 0x00, 0x00, 0x81]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        match sensor.device_status() {
            Err(Error::Crc{ word: 0 }) => (),
            r => panic!("Unexpected result: {:?}", r),
        }

        i2c.done();
    }

    #[test]
    fn test_transport_error() {
        let expectations = [
            failed_command(Command::StartMeasurement),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        match sensor.start_measurement() {
            Err(Error::Transport(_)) => (),
            r => panic!("Unexpected result: {:?}", r),
        }

        i2c.done();
    }

    #[test]
    fn test_identity() {
        let expectations = [
            command(Command::GetProductName),
            ascii_reply("SEN69C"),
            command(Command::GetSerialNumber),
            ascii_reply("A1B2C3D4E5F6"),
            command(Command::GetVersion),
            reply(&[0x0302]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        assert_eq!(sensor.product_name().unwrap(), "SEN69C");
        assert_eq!(sensor.serial_number().unwrap(), "A1B2C3D4E5F6");

        let v = sensor.firmware_version().unwrap();
        assert_eq!(v, FirmwareVersion{ major: 3, minor: 2 });
        assert_eq!(format!("{}", v), "3.2");

        i2c.done();
    }

    #[test]
    fn test_forced_recalibration() {
        let expectations = [
            command_with(Command::ForcedCo2Recalibration, &[420]),
            reply(&[0x8032]),
            reply(&[0x7FCE]),
            reply(&[FRC_FAILED]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        sensor.start_forced_recalibration(420).unwrap();
        assert_eq!(sensor.read_forced_recalibration().unwrap(), 50);
        assert_eq!(sensor.read_forced_recalibration().unwrap(), -50);

        match sensor.read_forced_recalibration() {
            Err(Error::CalibrationRejected) => (),
            r => panic!("Unexpected result: {:?}", r),
        }

        i2c.done();
    }

    #[test]
    fn test_voc_algorithm_state() {
        let state = Baseline{ state0: -2, state1: 0x0001_0002 };

        let mut expectations = read(Command::VocAlgorithmState, &[0xFFFF, 0xFFFE, 0x0001, 0x0002]);
        expectations.push(command_with(Command::VocAlgorithmState, &[0xFFFF, 0xFFFE, 0x0001, 0x0002]));
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        assert_eq!(sensor.voc_algorithm_state().unwrap(), state);
        sensor.set_voc_algorithm_state(&state).unwrap();

        i2c.done();
    }

    #[test]
    fn test_read_and_clear_status() {
        let expectations = read(Command::ReadAndClearDeviceStatus, &[0x0020, 0x0000]);
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        let s = sensor.read_and_clear_device_status().unwrap();
        assert!(s.fan_warning());

        i2c.done();
    }

    #[test]
    fn test_number_concentration() {
        let expectations = read(Command::ReadNumberConcentration, &[105, 210, 300, 400, 0xFFFF]);
        let mut i2c = I2cMock::new(&expectations);
        let mut sensor = mock_sensor(&i2c);

        let nc = sensor.number_concentration().unwrap();
        assert_approx_eq!(nc.nc0_5.unwrap(), 10.5);
        assert_eq!(nc.nc10_0, None);

        i2c.done();
    }
}
