//! Sen6x controller
//!
//! Owns the sensor and preference store, runs the ordered boot configuration,
//! polls measurements and sequences maintenance operations. Time is supplied
//! by the caller as monotonic milliseconds, only bus-mandated spacing blocks.
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

use crate::{Error, FirmwareVersion, Sen6x};
use crate::baseline::{Baseline, BaselineTracker};
use crate::compensation::{self, Compensation, CompensationValue, Source};
use crate::config::{Config, Phase, SetupItem, setup_items};
use crate::device::*;
use crate::measurement::{Measurement, NumberConcentration};
use crate::model::Model;
use crate::sequence::{Mode, Operation, Outcome, Sequence, Step};
use crate::status::DeviceStatus;
use crate::store::{self, PreferenceKey, Preferences, Store};

/// A successful poll
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub measurement: Measurement,
    /// Device status, `None` if the status read failed
    pub status: Option<DeviceStatus>,
    /// Number concentrations, when enabled and readable
    pub number_concentration: Option<NumberConcentration>,
}

/// Device identity, read once at setup
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Identity {
    pub product_name: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_version: Option<FirmwareVersion>,
}

/// Automatic fan cleaning schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoCleaning {
    Disabled,
    /// First cleaning one interval after enabling
    FirstPending { at: u64 },
    Recurring { at: u64 },
}

impl AutoCleaning {
    fn due(&self, now: u64) -> bool {
        match self {
            AutoCleaning::Disabled => false,
            AutoCleaning::FirstPending{ at } | AutoCleaning::Recurring{ at } => now >= *at,
        }
    }
}

/// Sen6x controller object
/// This is generic over the sensor's connector, delay and error types, and the preference store
pub struct Controller<Conn, Delay, Err, S> {
    sensor: Sen6x<Conn, Delay, Err>,
    prefs: Preferences<S>,
    config: Config,

    model: Model,
    mode: Mode,
    sequence: Sequence,
    failed: bool,

    identity: Identity,
    compensation: Compensation,
    baseline: Option<BaselineTracker>,
    last_written_pressure: Option<f32>,

    cleaning_active: bool,
    cleaning_settle_until: Option<u64>,
    auto_cleaning: AutoCleaning,

    last_update: Option<u64>,
}

impl <Conn, Delay, Err, S> Controller<Conn, Delay, Err, S> where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Delay: DelayMs<u32>,
    Err: Debug,
    S: Store,
{
    /// Create a new controller, no bus traffic is generated until [`Controller::begin`]
    pub fn new(sensor: Sen6x<Conn, Delay, Err>, store: S, config: Config) -> Self {
        let model = config.model.unwrap_or(Model::FALLBACK);

        Controller {
            sensor,
            prefs: Preferences::new(store),
            config,
            model,
            mode: Mode::Unknown,
            sequence: Sequence::Idle,
            failed: false,
            identity: Identity::default(),
            compensation: Compensation::default(),
            baseline: None,
            last_written_pressure: None,
            cleaning_active: false,
            cleaning_settle_until: None,
            auto_cleaning: AutoCleaning::Disabled,
            last_update: None,
        }
    }

    /// Force the device into idle mode and schedule setup once it has settled
    pub fn begin(&mut self, now: u64) {
        info!("Setting up Sen6x");

        // The device may still be measuring from before a host reset
        if let Err(e) = self.sensor.stop_measurement() {
            warn!("Stop measurement failed during setup: {:?}", e);
        }

        self.failed = false;
        self.mode = Mode::Stopping{ ready_at: now + STOP_SETTLE_MS };
        self.sequence = Sequence::AwaitingSettle{ resume_at: now + STOP_SETTLE_MS, next: Step::Setup };
    }

    /// Advance pending sequences and the auto cleaning schedule
    pub fn tick(&mut self, now: u64) -> Option<Outcome<Err>> {
        if let Mode::Stopping{ ready_at } = self.mode {
            if now >= ready_at {
                self.mode = Mode::Idle;
            }
        }

        if let Some(step) = self.sequence.take_due(now) {
            return self.run_step(step, now);
        }

        if !self.sequence.is_active() && !self.failed && self.auto_cleaning.due(now) {
            self.auto_cleaning = AutoCleaning::Recurring{ at: now + self.config.auto_cleaning_interval_ms };
            info!("Starting scheduled fan cleaning");

            if let Err(e) = self.begin_idle_sequence(Step::StartFanCleaning, now) {
                warn!("Scheduled fan cleaning failed to start: {:?}", e);
                return Some(Outcome::Failed(Operation::FanCleaning, e));
            }
        }

        None
    }

    /// Poll for a measurement
    ///
    /// Returns `Ok(None)` when the poll is skipped (sequence in progress, fan
    /// cleaning or no new data), and `Error::NotStable` when the device reported
    /// a not-yet-valid frame.
    pub fn update(&mut self, now: u64) -> Result<Option<Reading>, Error<Err>> {
        if self.failed {
            return Err(Error::NotRunning);
        }

        if self.sequence.is_active() || self.mode != Mode::Measuring {
            debug!("Skipping update, sequence in progress");
            return Ok(None);
        }

        let elapsed = self.last_update.map(|t| now.saturating_sub(t)).unwrap_or(0);
        self.last_update = Some(now);

        if self.cleaning_active {
            debug!("Skipping update during fan cleaning");
            return Ok(None);
        }
        if let Some(until) = self.cleaning_settle_until {
            if now < until {
                debug!("Skipping update, settling after fan cleaning");
                return Ok(None);
            }
            self.cleaning_settle_until = None;
        }

        self.update_baseline(elapsed);

        let status = match self.sensor.device_status() {
            Ok(s) => {
                debug!("Device status: {}", s);
                s.log_faults();
                Some(s)
            },
            Err(e) => {
                warn!("Failed to read device status: {:?}", e);
                None
            }
        };

        if !self.sensor.data_ready()? {
            debug!("Data not ready yet, skipping measurement");
            return Ok(None);
        }

        let measurement = self.sensor.read_measured_values(self.model)?;

        let number_concentration = match self.config.number_concentration {
            false => None,
            true => match self.sensor.number_concentration() {
                Ok(nc) => Some(nc),
                Err(e) => {
                    warn!("Failed to read number concentration: {:?}", e);
                    None
                }
            },
        };

        Ok(Some(Reading{ measurement, status, number_concentration }))
    }

    /// Read the VOC algorithm state once enough time has accumulated, persisting drift
    fn update_baseline(&mut self, elapsed: u64) {
        let tracker = match self.baseline.as_mut() {
            Some(t) => t,
            None => return,
        };

        if !tracker.accumulate(elapsed) {
            return;
        }

        let state = match self.sensor.voc_algorithm_state() {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to read VOC algorithm state: {:?}", e);
                return;
            }
        };

        if tracker.observe(state) {
            if self.prefs.save(PreferenceKey::VocBaseline, &state) {
                info!("Stored VOC baseline state0: 0x{:08X}, state1: 0x{:08X}", state.state0, state.state1);
            } else {
                warn!("Could not store VOC baseline");
            }
        }
    }

    fn run_step(&mut self, step: Step, now: u64) -> Option<Outcome<Err>> {
        trace!("Running step {:?}", step);

        match step {
            Step::Setup => Some(self.setup(now)),
            Step::Reboot => Some(match self.setup(now) {
                Outcome::Failed(_, e) => Outcome::Failed(Operation::DeviceReset, e),
                _ => Outcome::Completed(Operation::DeviceReset),
            }),
            Step::WriteAltitude(altitude) => {
                let r = self.sensor.write_compensation(CompensationValue::Altitude, altitude);
                if r.is_ok() {
                    self.compensation.altitude = Some(altitude);
                    self.prefs.save(PreferenceKey::Altitude, &altitude);
                }
                self.finish(Operation::SetAltitude, r, now)
            },
            Step::WriteAutoSelfCalibration(enabled) => {
                let r = self.sensor.set_auto_self_calibration(enabled);
                if r.is_ok() {
                    self.compensation.auto_self_calibration = enabled;
                    self.prefs.save(PreferenceKey::AutoSelfCalibration, &enabled);
                }
                self.finish(Operation::SetAutoSelfCalibration, r, now)
            },
            Step::ForcedRecalibration(reference) => {
                info!("Executing forced CO2 recalibration with reference: {} ppm", reference);
                match self.sensor.start_forced_recalibration(reference) {
                    Ok(_) => self.await_execution(FRC_EXECUTION_MS, Step::ReadRecalibration, now),
                    Err(e) => self.finish(Operation::ForcedRecalibration, Err(e), now),
                }
            },
            Step::ReadRecalibration => {
                let r = self.sensor.read_forced_recalibration();
                self.restart(now);

                match r {
                    Ok(correction_ppm) => {
                        info!("Forced recalibration complete, correction: {} ppm", correction_ppm);
                        Some(Outcome::Recalibrated{ correction_ppm })
                    },
                    Err(e) => {
                        warn!("Forced recalibration failed: {:?}", e);
                        Some(Outcome::Failed(Operation::ForcedRecalibration, e))
                    }
                }
            },
            Step::Co2FactoryReset => {
                warn!("Resetting CO2 calibration history to factory defaults");
                match self.sensor.co2_factory_reset() {
                    Ok(_) => self.await_execution(CO2_FACTORY_RESET_MS, Step::Resume(Operation::Co2FactoryReset), now),
                    Err(e) => self.finish(Operation::Co2FactoryReset, Err(e), now),
                }
            },
            Step::ActivateHeater => {
                match self.sensor.activate_heater() {
                    Ok(_) => {
                        info!("SHT heater activated, waiting for cool-down");
                        self.await_execution(HEATER_COOLDOWN_MS, Step::Resume(Operation::ActivateHeater), now)
                    },
                    Err(e) => self.finish(Operation::ActivateHeater, Err(e), now),
                }
            },
            Step::StartFanCleaning => {
                match self.sensor.start_fan_cleaning() {
                    Ok(_) => {
                        info!("Fan cleaning started");
                        self.cleaning_active = true;
                        self.await_execution(FAN_CLEANING_MS, Step::Resume(Operation::FanCleaning), now)
                    },
                    Err(e) => self.finish(Operation::FanCleaning, Err(e), now),
                }
            },
            Step::Resume(op) => {
                if op == Operation::FanCleaning {
                    self.cleaning_active = false;
                    self.cleaning_settle_until = Some(now + POST_CLEANING_SETTLE_MS);
                }
                self.finish(op, Ok(()), now)
            },
            Step::Restart => {
                self.restart(now);
                None
            },
        }
    }

    fn await_execution(&mut self, duration: u64, next: Step, now: u64) -> Option<Outcome<Err>> {
        self.sequence = Sequence::AwaitingExecution{ resume_at: now + duration, next };
        None
    }

    /// Restart measurement and report the operation result
    fn finish(&mut self, op: Operation, r: Result<(), Error<Err>>, now: u64) -> Option<Outcome<Err>> {
        self.restart(now);

        Some(match r {
            Ok(_) => {
                info!("{:?} complete", op);
                Outcome::Completed(op)
            },
            Err(e) => {
                warn!("{:?} failed: {:?}", op, e);
                Outcome::Failed(op, e)
            },
        })
    }

    /// Start measurement, retrying later on failure so the device is never left idle
    fn restart(&mut self, now: u64) {
        match self.sensor.start_measurement() {
            Ok(_) => {
                debug!("Measurement restarted");
                self.mode = Mode::Measuring;
            },
            Err(e) => {
                warn!("Failed to restart measurement: {:?}", e);
                self.mode = Mode::Idle;
                self.sequence = Sequence::AwaitingExecution{ resume_at: now + RESTART_RETRY_MS, next: Step::Restart };
            }
        }
    }

    /// Ordered boot configuration, the device must be idle
    fn setup(&mut self, now: u64) -> Outcome<Err> {
        for item in setup_items(Phase::PreStart) {
            self.apply(item, now);
        }

        if let Err(e) = self.sensor.start_measurement() {
            error!("Failed to start measurement: {:?}", e);
            self.failed = true;
            self.mode = Mode::Idle;
            return Outcome::Failed(Operation::Setup, e);
        }
        info!("Measurement started");
        self.mode = Mode::Measuring;

        for item in setup_items(Phase::PostStart) {
            self.apply(item, now);
        }

        self.last_update = None;

        Outcome::Completed(Operation::Setup)
    }

    /// Apply a single setup item, failures are logged and setup continues
    fn apply(&mut self, item: SetupItem, now: u64) {
        trace!("Applying {:?}", item);

        match item {
            SetupItem::Identity => self.read_identity(),
            SetupItem::VocTuning => {
                if let (Some(t), true) = (self.config.voc_tuning, self.model.has_voc()) {
                    info!("Applying VOC tuning: offset={}, learning={}h", t.index_offset, t.learning_time_gain_hours);
                    if let Err(e) = self.sensor.set_voc_tuning(&t) {
                        warn!("Failed to apply VOC tuning: {:?}", e);
                    }
                }
            },
            SetupItem::NoxTuning => {
                if let (Some(t), true) = (self.config.nox_tuning, self.model.has_nox()) {
                    info!("Applying NOx tuning: offset={}, learning={}h", t.index_offset, t.learning_time_gain_hours);
                    if let Err(e) = self.sensor.set_nox_tuning(&t) {
                        warn!("Failed to apply NOx tuning: {:?}", e);
                    }
                }
            },
            SetupItem::RhtAcceleration => {
                if let Some(p) = self.config.rht_acceleration {
                    if let Err(e) = self.sensor.set_rht_acceleration(&p) {
                        warn!("Failed to apply RHT acceleration: {:?}", e);
                    }
                }
            },
            SetupItem::VocBaseline => self.restore_baseline(),
            SetupItem::AutoSelfCalibration => {
                let enabled = self.prefs.load::<bool>(PreferenceKey::AutoSelfCalibration).unwrap_or(true);
                self.compensation.auto_self_calibration = enabled;

                if self.model.has_co2() {
                    info!("CO2 ASC: {}", if enabled { "ON" } else { "OFF" });
                    if let Err(e) = self.sensor.set_auto_self_calibration(enabled) {
                        warn!("Failed to apply CO2 ASC: {:?}", e);
                    }
                }
            },
            SetupItem::Altitude => self.reconcile(CompensationValue::Altitude),
            SetupItem::AmbientPressure => self.reconcile(CompensationValue::AmbientPressure),
            SetupItem::TemperatureOffset => self.reconcile(CompensationValue::TemperatureOffset),
            SetupItem::TemperatureCompensation => {
                if let Some(c) = self.config.temperature_compensation {
                    if let Err(e) = self.sensor.set_temperature_compensation(&c) {
                        warn!("Failed to apply temperature compensation: {:?}", e);
                    }
                }
            },
            SetupItem::Co2Reference => {
                if let Some(v) = self.prefs.load_value(PreferenceKey::Co2Reference) {
                    info!("Restored outdoor CO2 reference: {:.0} ppm", v);
                    self.compensation.co2_reference = v;
                }
            },
            SetupItem::AutoCleaning => {
                let enabled = self.prefs.load::<bool>(PreferenceKey::AutoCleaning).unwrap_or(false);
                self.compensation.auto_cleaning = enabled;
                self.schedule_auto_cleaning(enabled, now);
            },
        }
    }

    fn read_identity(&mut self) {
        match self.sensor.serial_number() {
            Ok(serial) => {
                let hash = store::preference_hash(serial.as_bytes());
                info!("Serial: {}, preference hash: 0x{:08X}", serial, hash);
                self.prefs.set_hash(hash);
                self.identity.serial_number = Some(serial);
            },
            Err(e) => {
                warn!("Failed to read serial, using fallback preference hash: {:?}", e);
                self.prefs.set_hash(store::FALLBACK_PREFERENCE_HASH);
            }
        }

        match self.sensor.product_name() {
            Ok(name) => {
                self.model = Model::from_product_name(&name);
                info!("Product: {}, model: {}", name, self.model);
                self.identity.product_name = Some(name);
            },
            Err(e) => {
                self.model = self.config.model.unwrap_or(Model::FALLBACK);
                warn!("Failed to read product name, assuming {}: {:?}", self.model, e);
            }
        }

        match self.sensor.firmware_version() {
            Ok(v) => {
                info!("Firmware version: {}", v);
                self.identity.firmware_version = Some(v);
            },
            Err(e) => warn!("Failed to read firmware version: {:?}", e),
        }
    }

    fn restore_baseline(&mut self) {
        if !self.config.store_baseline || !self.model.has_voc() {
            self.baseline = None;
            return;
        }

        let stored = self.prefs.load::<Baseline>(PreferenceKey::VocBaseline).unwrap_or_default();

        if stored.is_set() {
            info!("Loaded VOC baseline state0: 0x{:08X}, state1: 0x{:08X}", stored.state0, stored.state1);
            match self.sensor.set_voc_algorithm_state(&stored) {
                Ok(_) => info!("Restored VOC algorithm state"),
                Err(e) => warn!("Failed to restore VOC algorithm state: {:?}", e),
            }
        }

        self.baseline = Some(BaselineTracker::new(stored));
    }

    fn reconcile(&mut self, value: CompensationValue) {
        if value.co2_only() && !self.model.has_co2() {
            return;
        }

        match compensation::reconcile(&mut self.sensor, &mut self.prefs, value) {
            Ok(r) => {
                *value.get_mut(&mut self.compensation) = Some(r.value);
                if value == CompensationValue::AmbientPressure && r.source == Source::Persisted {
                    self.last_written_pressure = Some(r.value);
                }
            },
            Err(e) => warn!("Failed to reconcile {:?}: {:?}", value, e),
        }
    }

    fn schedule_auto_cleaning(&mut self, enabled: bool, now: u64) {
        self.auto_cleaning = match enabled {
            true => {
                let interval = self.config.auto_cleaning_interval_ms;
                info!("Auto fan cleaning enabled, every {} hours", interval / 3_600_000);
                AutoCleaning::FirstPending{ at: now + interval }
            },
            false => AutoCleaning::Disabled,
        };
    }

    /// Runtime requests need a running controller with no sequence in flight
    fn ensure_ready(&self) -> Result<(), Error<Err>> {
        if self.failed {
            return Err(Error::NotRunning);
        }
        if self.sequence.is_active() {
            return Err(Error::Busy);
        }
        Ok(())
    }

    fn require_co2(&self, feature: &'static str) -> Result<(), Error<Err>> {
        match self.model.has_co2() {
            true => Ok(()),
            false => {
                warn!("{} not supported on {}", feature, self.model);
                Err(Error::UnsupportedOnModel{ model: self.model, feature })
            }
        }
    }

    /// Stop measurement and schedule `next` once the device is idle
    fn begin_idle_sequence(&mut self, next: Step, now: u64) -> Result<(), Error<Err>> {
        self.sensor.stop_measurement()?;

        let ready_at = now + STOP_SETTLE_MS;
        self.mode = Mode::Stopping{ ready_at };
        self.sequence = Sequence::AwaitingSettle{ resume_at: ready_at, next };

        Ok(())
    }

    /// Set sensor altitude in meters, applied in idle mode and persisted
    pub fn set_altitude(&mut self, altitude: f32, now: u64) -> Result<(), Error<Err>> {
        self.ensure_ready()?;
        self.require_co2("altitude compensation")?;
        if !CompensationValue::Altitude.in_range(altitude) {
            return Err(Error::OutOfRange);
        }

        debug!("Setting altitude: {:.1} m (stopping measurement)", altitude);
        self.begin_idle_sequence(Step::WriteAltitude(altitude), now)
    }

    /// Enable or disable CO2 automatic self calibration, applied in idle mode and persisted
    pub fn set_auto_self_calibration(&mut self, enabled: bool, now: u64) -> Result<(), Error<Err>> {
        self.ensure_ready()?;
        self.require_co2("automatic self calibration")?;

        self.begin_idle_sequence(Step::WriteAutoSelfCalibration(enabled), now)
    }

    /// Set ambient pressure compensation in hPa, written directly and persisted
    pub fn set_ambient_pressure_compensation(&mut self, pressure: f32) -> Result<(), Error<Err>> {
        self.ensure_ready()?;
        self.require_co2("ambient pressure compensation")?;
        if !CompensationValue::AmbientPressure.in_range(pressure) {
            return Err(Error::OutOfRange);
        }

        self.write_pressure(pressure)
    }

    fn write_pressure(&mut self, pressure: f32) -> Result<(), Error<Err>> {
        self.sensor.write_compensation(CompensationValue::AmbientPressure, pressure)?;

        self.last_written_pressure = Some(pressure);
        self.compensation.ambient_pressure = Some(pressure);
        self.prefs.save(PreferenceKey::AmbientPressure, &pressure);

        Ok(())
    }

    /// Feed an external pressure reading in hPa
    ///
    /// Ignored on variants without CO2, and only written when it differs from the
    /// last written value by at least 1 hPa. Returns whether a write was issued.
    pub fn feed_ambient_pressure(&mut self, pressure: f32) -> Result<bool, Error<Err>> {
        if !CompensationValue::AmbientPressure.in_range(pressure) {
            warn!("Ambient pressure {:.1} hPa out of range, ignoring", pressure);
            return Err(Error::OutOfRange);
        }

        if !self.model.has_co2() {
            return Ok(false);
        }

        if let Some(last) = self.last_written_pressure {
            if (pressure - last).abs() < 1.0 {
                return Ok(false);
            }
        }

        self.ensure_ready()?;

        debug!("External pressure: {:.1} hPa (last written {:?})", pressure, self.last_written_pressure);
        self.write_pressure(pressure)?;

        Ok(true)
    }

    /// Set a constant temperature offset in degrees celsius, written directly and persisted
    pub fn set_temperature_offset(&mut self, offset: f32) -> Result<(), Error<Err>> {
        self.ensure_ready()?;
        if !CompensationValue::TemperatureOffset.in_range(offset) {
            return Err(Error::OutOfRange);
        }

        self.sensor.write_compensation(CompensationValue::TemperatureOffset, offset)?;

        self.compensation.temperature_offset = Some(offset);
        self.prefs.save(PreferenceKey::TemperatureOffset, &offset);

        Ok(())
    }

    /// Set the outdoor CO2 reference in ppm, used as the default recalibration target
    pub fn set_co2_reference(&mut self, ppm: f32) -> Result<(), Error<Err>> {
        if !ppm.is_finite() || ppm <= 0.0 || ppm > u16::MAX as f32 {
            return Err(Error::OutOfRange);
        }

        info!("Setting outdoor CO2 reference: {:.0} ppm", ppm);
        self.compensation.co2_reference = ppm;
        self.prefs.save(PreferenceKey::Co2Reference, &ppm);

        Ok(())
    }

    /// Enable or disable periodic fan cleaning, the first cleaning runs one interval after enabling
    pub fn set_auto_cleaning(&mut self, enabled: bool, now: u64) {
        self.compensation.auto_cleaning = enabled;
        self.prefs.save(PreferenceKey::AutoCleaning, &enabled);
        self.schedule_auto_cleaning(enabled, now);
    }

    /// Start a forced CO2 recalibration, against the stored CO2 reference if none is provided
    pub fn start_forced_recalibration(&mut self, reference_ppm: Option<u16>, now: u64) -> Result<(), Error<Err>> {
        self.ensure_ready()?;
        self.require_co2("forced recalibration")?;

        let reference = reference_ppm.unwrap_or(self.compensation.co2_reference.round() as u16);
        info!("Starting forced CO2 recalibration with reference: {} ppm", reference);

        self.begin_idle_sequence(Step::ForcedRecalibration(reference), now)
    }

    /// Reset the CO2 calibration history (FRC and ASC) to factory defaults
    pub fn start_co2_factory_reset(&mut self, now: u64) -> Result<(), Error<Err>> {
        self.ensure_ready()?;
        self.require_co2("CO2 factory reset")?;

        self.begin_idle_sequence(Step::Co2FactoryReset, now)
    }

    /// Activate the SHT heater, measurement resumes after the cool-down
    pub fn activate_heater(&mut self, now: u64) -> Result<(), Error<Err>> {
        self.ensure_ready()?;
        self.begin_idle_sequence(Step::ActivateHeater, now)
    }

    /// Run a fan cleaning cycle, polls are skipped until it has completed and settled
    pub fn start_fan_cleaning(&mut self, now: u64) -> Result<(), Error<Err>> {
        self.ensure_ready()?;
        self.begin_idle_sequence(Step::StartFanCleaning, now)
    }

    /// Reset the device and re-run setup once it has rebooted
    pub fn reset_device(&mut self, now: u64) -> Result<(), Error<Err>> {
        self.ensure_ready()?;

        warn!("Resetting device");
        self.sensor.device_reset()?;

        self.mode = Mode::Unknown;
        self.sequence = Sequence::AwaitingExecution{ resume_at: now + DEVICE_RESET_MS, next: Step::Reboot };

        Ok(())
    }

    /// Read and clear latched device status flags, returning the prior status
    pub fn clear_device_status(&mut self) -> Result<DeviceStatus, Error<Err>> {
        self.ensure_ready()?;

        let s = self.sensor.read_and_clear_device_status()?;
        info!("Device status cleared, previous status was: {}", s);

        Ok(s)
    }

    /// Invalidate persisted compensation values and restore switch defaults
    /// Device state is untouched, reconciliation reads from the device at next boot
    pub fn reset_preferences(&mut self) {
        warn!("Resetting all preferences to defaults");
        self.prefs.reset();
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Whether setup failed to start measurement
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn compensation(&self) -> &Compensation {
        &self.compensation
    }

    pub fn auto_cleaning(&self) -> AutoCleaning {
        self.auto_cleaning
    }

    /// Fan cleaning running or settling, particulate readings are not usable
    pub fn is_fan_cleaning(&self, now: u64) -> bool {
        self.cleaning_active || self.cleaning_settle_until.map(|t| now < t).unwrap_or(false)
    }

    pub fn preference_hash(&self) -> u32 {
        self.prefs.hash()
    }

    pub fn store(&self) -> &S {
        self.prefs.store()
    }

    pub fn sensor(&mut self) -> &mut Sen6x<Conn, Delay, Err> {
        &mut self.sensor
    }
}
