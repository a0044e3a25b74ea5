//! Configuration using Figment.
//!
//! Configuration is loaded from:
//! 1. a TOML file (`hvps.toml` by default), every key optional
//! 2. environment variables prefixed with `HVPS_`, nested keys separated by
//!    a double underscore
//!
//! # Example
//! ```no_run
//! use hvps::config::HvpsConfig;
//!
//! # fn main() -> hvps::Result<()> {
//! // HVPS_CONNECTION__PORT=/dev/ttyUSB1 overrides [connection] port
//! let config = HvpsConfig::load_from("hvps.toml")?;
//! config.validate()?;
//! println!("{} on {}", config.device.brand, config.connection.port);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{HvpsError, Result};
use crate::logging::OutputFormat;
use crate::protocol::{Brand, MAX_BOARD};
use crate::simulation::SimulationOptions;

/// File read by [`HvpsConfig::load`].
pub const DEFAULT_CONFIG_PATH: &str = "hvps.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HvpsConfig {
    /// `[connection]`
    pub connection: ConnectionConfig,
    /// `[device]`
    pub device: DeviceConfig,
    /// `[simulator]`, used only with `--simulate`
    pub simulator: SimulatorConfig,
    /// `[logging]`
    pub logging: LoggingSettings,
}

/// Serial line settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Line speed; 8N1 is fixed
    pub baud_rate: u32,
    /// Per-line read deadline in milliseconds
    pub timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            timeout_ms: 1000,
        }
    }
}

impl ConnectionConfig {
    /// Per-line read deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Which device to talk to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Protocol family
    pub brand: Brand,
    /// Board address of the module (always 0 for iseg)
    pub board: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            brand: Brand::Caen,
            board: 0,
        }
    }
}

/// Simulated module used by `--simulate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Number of channels of the simulated module
    pub channels: usize,
    /// Probability per tick that any channel of the module trips
    pub trip_probability: f64,
    /// Period of the background ticker in milliseconds
    pub tick_interval_ms: u64,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            trip_probability: 0.0,
            tick_interval_ms: 1000,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    /// Engine options for a module of `device`.
    pub fn options(&self, device: &DeviceConfig) -> SimulationOptions {
        let options = SimulationOptions::new(device.brand)
            .with_board(device.board)
            .with_channels(self.channels)
            .with_trip_probability(self.trip_probability)
            .with_tick_interval(Duration::from_millis(self.tick_interval_ms));
        match self.seed {
            Some(seed) => options.with_seed(seed),
            None => options,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error
    pub level: String,
    /// pretty, compact or json
    pub format: OutputFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Pretty,
        }
    }
}

impl HvpsConfig {
    /// Loads [`DEFAULT_CONFIG_PATH`] plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads `path` plus environment overrides. A missing file leaves the
    /// defaults in place.
    ///
    /// Example override: `HVPS_SIMULATOR__TRIP_PROBABILITY=0.05`
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: HvpsConfig = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("HVPS_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validates configuration after loading.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(HvpsError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        if self.connection.port.trim().is_empty() {
            return Err(HvpsError::Configuration(
                "connection.port must not be empty".to_string(),
            ));
        }
        if self.connection.baud_rate == 0 {
            return Err(HvpsError::Configuration(
                "connection.baud_rate must be positive".to_string(),
            ));
        }
        if self.connection.timeout_ms == 0 {
            return Err(HvpsError::Configuration(
                "connection.timeout_ms must be positive".to_string(),
            ));
        }

        if self.device.board > MAX_BOARD {
            return Err(HvpsError::Configuration(format!(
                "device.board {} out of range 0..={MAX_BOARD}",
                self.device.board
            )));
        }
        if self.device.brand == Brand::Iseg && self.device.board != 0 {
            return Err(HvpsError::Configuration(
                "iseg modules are not addressed; device.board must be 0".to_string(),
            ));
        }

        let p = self.simulator.trip_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(HvpsError::Configuration(format!(
                "simulator.trip_probability {p} must be within 0..=1"
            )));
        }
        if !(1..=8).contains(&self.simulator.channels) {
            return Err(HvpsError::Configuration(format!(
                "simulator.channels {} must be within 1..=8",
                self.simulator.channels
            )));
        }
        if self.simulator.tick_interval_ms == 0 {
            return Err(HvpsError::Configuration(
                "simulator.tick_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
