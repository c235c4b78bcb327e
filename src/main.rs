//! Sen6x command-line utility
//!
//! Copyright 2019 Ryan Kurte

use std::time::Instant;

extern crate embedded_hal;
extern crate linux_embedded_hal;
use linux_embedded_hal::{Delay, I2cdev};

extern crate structopt;
use structopt::StructOpt;

extern crate humantime;
use humantime::{Duration as HumanDuration};

#[macro_use] extern crate log;
extern crate simplelog;
use simplelog::{TermLogger, LevelFilter};

extern crate sensor_sen6x;
use sensor_sen6x::{Config, Controller, Error, Outcome, Reading, Sen6x, Store};
use sensor_sen6x::store::FileStore;

#[derive(StructOpt)]
#[structopt(name = "sen6x-util")]
/// A Command Line Interface (CLI) for interacting with a local Sen6x environmental sensor over I2C
pub struct Options {

    /// Specify the i2c interface to use to connect to the sen6x device
    #[structopt(short="d", long = "i2c", default_value = "/dev/i2c-1", env = "SEN6X_I2C")]
    i2c: String,

    /// Preference file, persisted compensation values and VOC baseline
    #[structopt(long = "store", default_value = "sen6x.json", env = "SEN6X_STORE")]
    store: String,

    /// Specify period for taking measurements
    #[structopt(short = "p", long = "sample-period", default_value="10s")]
    pub period: HumanDuration,

    /// Delay between sensor poll operations
    #[structopt(long = "poll-delay", default_value="100ms")]
    pub poll_delay: HumanDuration,

    /// Interval between automatic fan cleanings, when enabled
    #[structopt(long = "auto-clean-interval", default_value="7days")]
    pub auto_clean_interval: HumanDuration,

    /// Read particle number concentrations with each measurement
    #[structopt(long = "number-concentration")]
    pub number_concentration: bool,

    /// Number of allowed consecutive I2C errors prior to exiting
    #[structopt(long = "allowed-errors", default_value="3")]
    pub allowed_errors: usize,

    /// Enable verbose logging
    #[structopt(long = "log-level", default_value = "info")]
    level: LevelFilter,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
pub enum Command {
    #[structopt(name = "run")]
    /// Continuously read and log measurements
    Run,

    #[structopt(name = "info")]
    /// Print device identity and compensation values
    Info,

    #[structopt(name = "clean")]
    /// Run a fan cleaning cycle
    Clean,

    #[structopt(name = "frc")]
    /// Forced CO2 recalibration, against the stored outdoor reference if none is provided
    Frc {
        /// Reference CO2 concentration (ppm)
        reference: Option<u16>,
    },

    #[structopt(name = "factory-reset")]
    /// Reset the CO2 calibration history
    FactoryReset,

    #[structopt(name = "heater")]
    /// Activate the SHT heater
    Heater,

    #[structopt(name = "reset")]
    /// Reset the device and re-apply configuration
    Reset,

    #[structopt(name = "set-altitude")]
    /// Set sensor altitude (m)
    SetAltitude {
        altitude: f32,
    },

    #[structopt(name = "set-pressure")]
    /// Set ambient pressure compensation (hPa)
    SetPressure {
        pressure: f32,
    },

    #[structopt(name = "set-temp-offset")]
    /// Set temperature offset (°C)
    SetTempOffset {
        #[structopt(raw(allow_hyphen_values = "true"))]
        offset: f32,
    },

    #[structopt(name = "co2-reference")]
    /// Set the outdoor CO2 reference (ppm)
    Co2Reference {
        ppm: f32,
    },

    #[structopt(name = "asc")]
    /// Enable CO2 automatic self calibration
    Asc {
        /// Disable instead of enabling
        #[structopt(long = "disable")]
        disable: bool,
    },

    #[structopt(name = "auto-clean")]
    /// Enable periodic fan cleaning
    AutoClean {
        /// Disable instead of enabling
        #[structopt(long = "disable")]
        disable: bool,
    },

    #[structopt(name = "clear-status")]
    /// Read and clear the device status register
    ClearStatus,

    #[structopt(name = "reset-preferences")]
    /// Invalidate persisted compensation values
    ResetPreferences,
}

/// Monotonic milliseconds since start
struct Clock(Instant);

impl Clock {
    fn now(&self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}

type Sen6xController<S> = Controller<I2cdev, Delay, <I2cdev as embedded_hal::blocking::i2c::Write>::Error, S>;

/// Tick the controller until the pending sequence completes
fn wait<S: Store>(ctl: &mut Sen6xController<S>, clock: &Clock, poll: &HumanDuration) -> Outcome<<I2cdev as embedded_hal::blocking::i2c::Write>::Error> {
    loop {
        if let Some(o) = ctl.tick(clock.now()) {
            return o;
        }
        std::thread::sleep(**poll);
    }
}

fn opt<T: std::fmt::Display>(v: Option<T>) -> String {
    v.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string())
}

fn log_reading(r: &Reading) {
    let m = &r.measurement;

    info!("PM1.0: {:.1} µg/m³, PM2.5: {:.1} µg/m³, PM4.0: {:.1} µg/m³, PM10: {:.1} µg/m³",
        m.pm1_0, m.pm2_5, m.pm4_0, m.pm10_0);
    info!("Temperature: {:.2} C, Humidity: {:.2} %, VOC: {}, NOx: {}, CO2: {} ppm, HCHO: {} ppb",
        m.temperature, m.humidity, opt(m.voc_index), opt(m.nox_index), opt(m.co2), opt(m.formaldehyde));

    if let Some(t) = m.tvoc() {
        info!("TVOC: {:.0} ppb (ethanol), {:.0} µg/m³ (WELL), {:.0} µg/m³ (RESET)", t.ethanol_ppb, t.well, t.reset);
    }

    if let Some(nc) = &r.number_concentration {
        info!("NC0.5: {}, NC1.0: {}, NC2.5: {}, NC4.0: {}, NC10: {} #/cm³",
            opt(nc.nc0_5), opt(nc.nc1_0), opt(nc.nc2_5), opt(nc.nc4_0), opt(nc.nc10_0));
    }
}

fn main() {
    // Load options
    let opts = Options::from_args();

    // Setup logging
    if let Err(e) = TermLogger::init(opts.level, simplelog::Config::default()) {
        eprintln!("Error initialising logger: {:?}", e);
    }

    debug!("Connecting to I2C device");
    let i2c = match I2cdev::new(&opts.i2c) {
        Ok(v) => v,
        Err(e) => {
            error!("Error opening I2C device '{}': {:?}", &opts.i2c, e);
            std::process::exit(-1);
        }
    };

    debug!("Opening preference store");
    let store = match FileStore::open(&opts.store) {
        Ok(v) => v,
        Err(e) => {
            error!("Error opening preference store '{}': {:?}", &opts.store, e);
            std::process::exit(-2);
        }
    };

    let config = Config {
        auto_cleaning_interval_ms: opts.auto_clean_interval.as_millis() as u64,
        number_concentration: opts.number_concentration,
        ..Config::default()
    };

    let clock = Clock(Instant::now());
    let mut ctl = Controller::new(Sen6x::new(i2c, Delay), store, config);

    debug!("Connecting to Sen6x");
    ctl.begin(clock.now());
    if let Outcome::Failed(_, e) = wait(&mut ctl, &clock, &opts.poll_delay) {
        error!("Error configuring Sen6x: {:?}", e);
        std::process::exit(-3);
    }

    let now = clock.now();
    let res = match &opts.command {
        Command::Run => run(&mut ctl, &clock, &opts),
        Command::Info => {
            let id = ctl.identity();
            info!("Product: {}, serial: {}, firmware: {}, model: {}",
                id.product_name.as_deref().unwrap_or("-"),
                id.serial_number.as_deref().unwrap_or("-"),
                opt(id.firmware_version),
                ctl.model());
            info!("Compensation: {:?}", ctl.compensation());
            ctl.sensor().device_status().map(|s| info!("Device status: {}", s))
        },
        Command::Clean => ctl.start_fan_cleaning(now),
        Command::Frc{ reference } => ctl.start_forced_recalibration(*reference, now),
        Command::FactoryReset => ctl.start_co2_factory_reset(now),
        Command::Heater => ctl.activate_heater(now),
        Command::Reset => ctl.reset_device(now),
        Command::SetAltitude{ altitude } => ctl.set_altitude(*altitude, now),
        Command::SetPressure{ pressure } => ctl.set_ambient_pressure_compensation(*pressure),
        Command::SetTempOffset{ offset } => ctl.set_temperature_offset(*offset),
        Command::Co2Reference{ ppm } => ctl.set_co2_reference(*ppm),
        Command::Asc{ disable } => ctl.set_auto_self_calibration(!*disable, now),
        Command::AutoClean{ disable } => {
            ctl.set_auto_cleaning(!*disable, now);
            Ok(())
        },
        Command::ClearStatus => ctl.clear_device_status().map(|s| info!("Previous status: {}", s)),
        Command::ResetPreferences => {
            ctl.reset_preferences();
            Ok(())
        },
    };

    if let Err(e) = res {
        error!("Command failed: {:?}", e);
        std::process::exit(-4);
    }

    // Wait for any sequence started by the command
    if ctl.sequence().is_active() {
        info!("Waiting for operation to complete");
        match wait(&mut ctl, &clock, &opts.poll_delay) {
            Outcome::Recalibrated{ correction_ppm } => info!("FRC correction: {} ppm", correction_ppm),
            Outcome::Completed(op) => info!("{:?} complete", op),
            Outcome::Failed(op, e) => {
                error!("{:?} failed: {:?}", op, e);
                std::process::exit(-5);
            }
        }
    }
}

fn run<S: Store>(ctl: &mut Sen6xController<S>, clock: &Clock, opts: &Options) -> Result<(), Error<<I2cdev as embedded_hal::blocking::i2c::Write>::Error>> {
    let period = opts.period.as_millis() as u64;
    let mut next_sample = clock.now();
    let mut errors = 0;

    debug!("Starting sensor polling");

    loop {
        let now = clock.now();

        if let Some(o) = ctl.tick(now) {
            match o {
                Outcome::Failed(op, e) => warn!("{:?} failed: {:?}", op, e),
                o => info!("{:?} complete", o.operation()),
            }
        }

        if now < next_sample {
            std::thread::sleep(*opts.poll_delay);
            continue;
        }

        match ctl.update(now) {
            Ok(Some(r)) => {
                log_reading(&r);
                errors = 0;
                next_sample = now + period;
            },
            Ok(None) => (),
            Err(Error::NotStable) => debug!("Sensor not yet stable"),
            Err(e) => {
                warn!("Error reading sensor data: {:?}", e);
                errors += 1;

                if errors > opts.allowed_errors {
                    error!("Exceeded maximum allowed I2C errors");
                    return Err(e);
                }
                next_sample = now + period;
            }
        }

        std::thread::sleep(*opts.poll_delay);
    }
}
