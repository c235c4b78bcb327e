//! Sen6x device definitions
//!
//! Copyright 2019 Ryan Kurte


/// Sen6x default I2C address
pub const DEFAULT_ADDRESS: u8 = 0x6B;

pub const CRC_POLY: u8 = 0x31;
pub const CRC_INIT: u8 = 0xff;
pub const CRC_XOR: u8 = 0x00;

/// Delay between issuing a read command and fetching the response
pub const READ_DELAY_MS: u32 = 20;

/// Spacing between a configuration write and the following command
pub const WRITE_SPACING_MS: u32 = 50;

/// Time for the device to enter idle mode after Stop Measurement
/// (datasheet minimum is 1400ms)
pub const STOP_SETTLE_MS: u64 = 1500;

/// Execution time of a forced CO2 recalibration (datasheet minimum is 500ms)
pub const FRC_EXECUTION_MS: u64 = 550;

/// Execution time of the CO2 sensor factory reset
pub const CO2_FACTORY_RESET_MS: u64 = 1500;

/// Cool-down after activating the SHT heater before temperature values are usable
pub const HEATER_COOLDOWN_MS: u64 = 20_000;

/// Duration of a fan cleaning cycle
pub const FAN_CLEANING_MS: u64 = 12_000;

/// Window after fan cleaning during which particulate readings are discarded
pub const POST_CLEANING_SETTLE_MS: u64 = 10_000;

/// Time for the device to come back up after a device reset
pub const DEVICE_RESET_MS: u64 = 1200;

/// Back-off between attempts to restart measurement after a failed Start
pub const RESTART_RETRY_MS: u64 = 1000;

/// Returned by the device when a forced recalibration failed
pub const FRC_FAILED: u16 = 0xFFFF;

/// Forced recalibration correction is reported relative to this value
pub const FRC_CORRECTION_OFFSET: u16 = 0x8000;

/// Length of the ASCII product name and serial number buffers
pub const IDENTITY_LEN: usize = 32;

/// Sen6x I2C Command
/// Command and data are big endian 16-bit unsigned integers, all data words are followed by a CRC-8 checksum
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Command {
    /// Start continuous measurement, only valid in idle mode
    StartMeasurement = 0x0021,

    /// Stop continuous measurement and return to idle mode
    /// The device needs 1400ms before accepting idle-only commands
    StopMeasurement = 0x0104,

    /// Fetch data ready status
    /// The low byte is 1 if data is available in the buffer, 0 otherwise
    GetDataReady = 0x0202,

    /// Read measured values (SEN62): PM + RH/T
    ReadMeasuredValuesSen62 = 0x04A3,
    /// Read measured values (SEN63C): PM + RH/T + CO2
    ReadMeasuredValuesSen63C = 0x0471,
    /// Read measured values (SEN65): PM + RH/T + VOC + NOx
    ReadMeasuredValuesSen65 = 0x0446,
    /// Read measured values (SEN66): PM + RH/T + VOC + NOx + CO2
    ReadMeasuredValuesSen66 = 0x0300,
    /// Read measured values (SEN68): PM + RH/T + VOC + NOx + HCHO
    ReadMeasuredValuesSen68 = 0x0467,
    /// Read measured values (SEN69C): PM + RH/T + VOC + NOx + HCHO + CO2
    ReadMeasuredValuesSen69C = 0x04B5,

    /// Read particle number concentrations, 5 words scaled x10
    ReadNumberConcentration = 0x0316,

    /// Temperature offset / compensation parameters
    /// Data is offset (x200), slope (x10000), time constant (s) and slot
    TemperatureOffset = 0x60B2,

    /// Temperature acceleration parameters (K, P, T1, T2), idle mode only
    RhtAcceleration = 0x6100,

    /// VOC algorithm tuning parameters, idle mode only
    VocTuning = 0x60D0,

    /// NOx algorithm tuning parameters, idle mode only
    NoxTuning = 0x60E1,

    /// VOC algorithm state, read in measurement mode, written in idle mode
    VocAlgorithmState = 0x6181,

    /// Forced CO2 recalibration
    /// Data is the reference concentration in ppm, the correction can be read 500ms later
    ForcedCo2Recalibration = 0x6707,

    /// Reset the CO2 calibration history to factory defaults
    Co2FactoryReset = 0x6754,

    /// Get / set CO2 automatic self calibration, idle mode only
    /// Data is a u16, 1 enables ASC and 0 disables ASC
    Co2AutomaticSelfCalibration = 0x6711,

    /// Get / set ambient pressure in hPa for CO2 compensation
    AmbientPressure = 0x6720,

    /// Get / set sensor altitude in meters for CO2 compensation, set in idle mode only
    SensorAltitude = 0x6736,

    /// Activate the SHT heater for 1s, idle mode only
    ActivateShtHeater = 0x6765,

    /// Start a fan cleaning cycle, idle mode only
    StartFanCleaning = 0x5607,

    /// Product name, 32 ASCII bytes
    GetProductName = 0xD014,

    /// Serial number, 32 ASCII bytes
    GetSerialNumber = 0xD033,

    /// Firmware version, major and minor byte
    GetVersion = 0xD100,

    /// Read device status, 2 words
    ReadDeviceStatus = 0xD206,

    /// Read and clear device status, 2 words
    ReadAndClearDeviceStatus = 0xD210,

    /// Reset the device
    DeviceReset = 0xD304,
}

