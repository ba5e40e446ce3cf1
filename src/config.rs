//! System configuration parameters
//!
//! All tunable parameters for the AutoCompressor, grouped by subsystem.
//! Loaded once at boot (NVS blob, JSON import or defaults), validated,
//! and then handed by value to the components that need it.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::control::flow::OutflowModel;
use crate::pins;

/// Upper bound on estimation retries; each retry doubles the burst.
pub const MAX_ESTIMATION_RETRIES: u8 = 4;

/// Pressure sensor wiring and calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Calibration gradient (display units per ADC count).
    pub m: f64,
    /// Calibration offset (display units).
    pub c: f64,
    /// Display units the calibration was taken in (e.g. "PSI").
    pub units: heapless::String<8>,
    /// ADC1 channel the transducer is wired to.
    pub adc_channel: u32,
    /// ADC samples averaged per reading.
    pub samples_per_read: u16,
}

/// Relay board wiring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Maximum channels the relay bank accepts.
    pub max_channels: u8,
    pub inlet_gpio: i32,
    /// Logic level that de-energises the inlet relay (valve closed).
    pub inlet_off_high: bool,
    pub outlet_gpio: i32,
    /// Logic level that de-energises the outlet relay (valve closed).
    pub outlet_off_high: bool,
}

/// Control-loop tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Inflate probe duration used to estimate the gas state (s).
    pub init_check_inflate: f64,
    /// Deflate probe duration used to estimate the gas state (s).
    pub init_check_deflate: f64,
    /// Compressor inflow rating (L/s).
    pub flow_rate_in: f64,
    /// Vent outflow model.
    pub outflow: OutflowModel,
    /// Tolerance band around the target (display units).
    pub error_margin: f64,
    /// Settle time after a valve closes before a reading is trusted (s).
    pub pressure_balance_delay: f64,
    /// Fixed extra open time added to every burst (s).
    pub on_delay: f64,
    /// Assumed ambient temperature (°C).
    pub temperature_c: f64,
    /// Correction rounds allowed before giving up.
    pub max_rounds: u32,
    /// Accumulated valve-open time allowed before giving up (s).
    pub max_total_secs: f64,
    /// Extra probe attempts (each twice as long) when a probe shows no change.
    pub probe_retries: u8,
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub sensor: SensorConfig,
    pub relays: RelayConfig,
    pub control: ControlConfig,
    /// Log level name ("error", "warn", "info", "debug", "trace").
    pub log_level: heapless::String<8>,
    /// Pressure to reach on boot (display units).
    pub default_target: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            // 12-bit ADC over a 0–100 PSI ratiometric transducer (0.5–4.5 V)
            m: 0.030_525,
            c: -12.5,
            units: heapless::String::try_from("PSI").unwrap_or_default(),
            adc_channel: pins::PRESSURE_ADC_CHANNEL,
            samples_per_read: 20,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_channels: 4,
            inlet_gpio: pins::INLET_RELAY_GPIO,
            // Opto-isolated relay boards are active-low.
            inlet_off_high: true,
            outlet_gpio: pins::OUTLET_RELAY_GPIO,
            outlet_off_high: true,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            init_check_inflate: 2.0,
            init_check_deflate: 2.0,
            flow_rate_in: 0.5,
            outflow: OutflowModel::default(),
            error_margin: 1.0,
            pressure_balance_delay: 1.0,
            on_delay: 0.0,
            temperature_c: 20.0,
            max_rounds: 20,
            max_total_secs: 600.0,
            probe_retries: 2,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            sensor: SensorConfig::default(),
            relays: RelayConfig::default(),
            control: ControlConfig::default(),
            log_level: heapless::String::try_from("info").unwrap_or_default(),
            default_target: 32.0,
        }
    }
}

impl SystemConfig {
    /// Parse a JSON document (e.g. from provisioning) and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.control;
        if !(c.error_margin > 0.0 && c.error_margin.is_finite()) {
            return Err(ConfigError::ValidationFailed(
                "error_margin must be > 0",
            ));
        }
        if !(c.init_check_inflate > 0.0 && c.init_check_inflate <= 60.0) {
            return Err(ConfigError::ValidationFailed(
                "init_check_inflate must be in (0, 60]",
            ));
        }
        if !(c.init_check_deflate > 0.0 && c.init_check_deflate <= 60.0) {
            return Err(ConfigError::ValidationFailed(
                "init_check_deflate must be in (0, 60]",
            ));
        }
        if !(c.flow_rate_in > 0.0 && c.flow_rate_in.is_finite()) {
            return Err(ConfigError::ValidationFailed(
                "flow_rate_in must be > 0",
            ));
        }
        match c.outflow {
            OutflowModel::Constant { litres_per_sec } => {
                if !(litres_per_sec > 0.0 && litres_per_sec.is_finite()) {
                    return Err(ConfigError::ValidationFailed(
                        "constant outflow must be > 0",
                    ));
                }
            }
            OutflowModel::Linear { m, c } => {
                if !(m.is_finite() && c.is_finite()) {
                    return Err(ConfigError::ValidationFailed(
                        "linear outflow coefficients must be finite",
                    ));
                }
            }
        }
        if !(c.pressure_balance_delay >= 0.0 && c.pressure_balance_delay <= 30.0) {
            return Err(ConfigError::ValidationFailed(
                "pressure_balance_delay must be 0–30",
            ));
        }
        if !(c.on_delay >= 0.0 && c.on_delay <= 10.0) {
            return Err(ConfigError::ValidationFailed("on_delay must be 0–10"));
        }
        if !(-40.0..=80.0).contains(&c.temperature_c) {
            return Err(ConfigError::ValidationFailed(
                "temperature_c must be -40.0–80.0",
            ));
        }
        if c.max_rounds == 0 {
            return Err(ConfigError::ValidationFailed("max_rounds must be > 0"));
        }
        if !(c.max_total_secs > 0.0 && c.max_total_secs.is_finite()) {
            return Err(ConfigError::ValidationFailed(
                "max_total_secs must be > 0",
            ));
        }
        if c.probe_retries > MAX_ESTIMATION_RETRIES {
            return Err(ConfigError::ValidationFailed(
                "probe_retries must be 0–4",
            ));
        }
        if !(self.sensor.m.is_finite() && self.sensor.m != 0.0 && self.sensor.c.is_finite()) {
            return Err(ConfigError::ValidationFailed(
                "sensor calibration must be finite with m != 0",
            ));
        }
        // The gas-law conversions assume readings in PSI.
        if !self.sensor.units.eq_ignore_ascii_case("psi") {
            return Err(ConfigError::ValidationFailed(
                "sensor units must be PSI",
            ));
        }
        if self.sensor.samples_per_read == 0 {
            return Err(ConfigError::ValidationFailed(
                "samples_per_read must be > 0",
            ));
        }
        if self.relays.max_channels < 2
            || self.relays.max_channels as usize > crate::drivers::relay::MAX_RELAY_CHANNELS
        {
            return Err(ConfigError::ValidationFailed(
                "max_channels must fit inlet and outlet and the bank capacity",
            ));
        }
        if self.relays.inlet_gpio == self.relays.outlet_gpio {
            return Err(ConfigError::ValidationFailed(
                "inlet and outlet relays must use different GPIOs",
            ));
        }
        if self.log_level().is_none() {
            return Err(ConfigError::ValidationFailed("unknown log_level"));
        }
        if !(self.default_target > 0.0 && self.default_target.is_finite()) {
            return Err(ConfigError::ValidationFailed(
                "default_target must be > 0",
            ));
        }
        Ok(())
    }

    /// Parsed log level, `None` if the stored name is not a level.
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        self.log_level.as_str().parse().ok()
    }
}
