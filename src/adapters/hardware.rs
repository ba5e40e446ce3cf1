//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the [`PressureSensor`], the [`RelayBank`] holding the two valve
//! relays, and a blocking delay, exposing them through [`PressurePort`],
//! [`ValvePort`] and [`DelayPort`].  This is the only module in the
//! system that touches actual hardware.  On non-espidf targets, the
//! underlying drivers use cfg-gated simulation stubs.

use embedded_hal::digital::OutputPin;
use log::{error, info};

use crate::app::ports::{DelayPort, PressurePort, Valve, ValvePort};
use crate::config::RelayConfig;
use crate::drivers::relay::RelayBank;
use crate::error::{RelayError, SensorError};
use crate::safety;
use crate::sensors::PressureSensor;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<P: OutputPin, D: DelayPort> {
    sensor: PressureSensor,
    relays: RelayBank<P>,
    delay: D,
}

impl<P: OutputPin, D: DelayPort> HardwareAdapter<P, D> {
    pub fn new(sensor: PressureSensor, relays: RelayBank<P>, delay: D) -> Self {
        Self {
            sensor,
            relays,
            delay,
        }
    }

    /// Register the inlet and outlet relays from `config` and record their
    /// off levels with the fail-safe.
    pub fn with_valves(
        sensor: PressureSensor,
        config: &RelayConfig,
        inlet: P,
        outlet: P,
        delay: D,
    ) -> Result<Self, RelayError> {
        let mut relays = RelayBank::new(usize::from(config.max_channels));
        relays.register(Valve::Inlet.channel_name(), inlet, config.inlet_off_high)?;
        safety::register_relay(config.inlet_gpio, config.inlet_off_high);
        relays.register(Valve::Outlet.channel_name(), outlet, config.outlet_off_high)?;
        safety::register_relay(config.outlet_gpio, config.outlet_off_high);
        info!(
            "Valves wired: inlet GPIO {}, outlet GPIO {}",
            config.inlet_gpio, config.outlet_gpio
        );
        Ok(Self::new(sensor, relays, delay))
    }

    pub fn sensor_mut(&mut self) -> &mut PressureSensor {
        &mut self.sensor
    }

    pub fn relays(&self) -> &RelayBank<P> {
        &self.relays
    }
}

// ── PressurePort implementation ───────────────────────────────

impl<P: OutputPin, D: DelayPort> PressurePort for HardwareAdapter<P, D> {
    fn read_pressure(&mut self) -> Result<f64, SensorError> {
        self.sensor.read()
    }

    fn units(&self) -> &str {
        self.sensor.units()
    }
}

// ── ValvePort implementation ──────────────────────────────────

impl<P: OutputPin, D: DelayPort> ValvePort for HardwareAdapter<P, D> {
    fn set_valve(&mut self, valve: Valve, open: bool) -> Result<(), RelayError> {
        self.relays.set(valve.channel_name(), open)
    }

    fn is_valve_open(&self, valve: Valve) -> Result<bool, RelayError> {
        self.relays.get_state(valve.channel_name())
    }

    fn close_all(&mut self) {
        if let Err(e) = self.relays.all_off() {
            error!("Relay bank could not close all valves ({}), forcing GPIO", e);
            safety::force_all_off();
        }
    }
}

// ── DelayPort implementation ──────────────────────────────────

impl<P: OutputPin, D: DelayPort> DelayPort for HardwareAdapter<P, D> {
    fn sleep_secs(&mut self, secs: f64) {
        self.delay.sleep_secs(secs);
    }
}
