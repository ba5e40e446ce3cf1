//! HardwareAdapter over the simulated GPIO and ADC drivers.

use crate::mock_hw::RecordingSink;
use autocompressor::adapters::hardware::HardwareAdapter;
use autocompressor::app::commands::AppCommand;
use autocompressor::app::ports::{DelayPort, PressurePort, Valve, ValvePort};
use autocompressor::app::service::{AppService, CommandReply};
use autocompressor::config::{RelayConfig, SensorConfig, SystemConfig};
use autocompressor::control::Outcome;
use autocompressor::drivers::hw_init::{sim_gpio_level, GpioOutput};
use autocompressor::error::{RelayError, SensorError};
use autocompressor::safety;
use autocompressor::sensors::pressure::{sim_set_adc_fault, sim_set_pressure_adc};
use autocompressor::sensors::PressureSensor;
use std::cell::Cell;
use std::rc::Rc;

/// Accumulates requested sleep time instead of sleeping.
#[derive(Default, Clone)]
struct NoDelay {
    slept: Rc<Cell<f64>>,
}

impl DelayPort for NoDelay {
    fn sleep_secs(&mut self, secs: f64) {
        self.slept.set(self.slept.get() + secs);
    }
}

fn relay_config(inlet: i32, outlet: i32) -> RelayConfig {
    RelayConfig {
        inlet_gpio: inlet,
        // active-low inlet, active-high outlet
        inlet_off_high: true,
        outlet_gpio: outlet,
        outlet_off_high: false,
        ..RelayConfig::default()
    }
}

fn adapter_with(inlet: i32, outlet: i32, delay: NoDelay) -> HardwareAdapter<GpioOutput, NoDelay> {
    HardwareAdapter::with_valves(
        PressureSensor::new(&SensorConfig::default()),
        &relay_config(inlet, outlet),
        GpioOutput::new(inlet),
        GpioOutput::new(outlet),
        delay,
    )
    .unwrap()
}

fn adapter(inlet: i32, outlet: i32) -> HardwareAdapter<GpioOutput, NoDelay> {
    adapter_with(inlet, outlet, NoDelay::default())
}

// ── Relays ────────────────────────────────────────────────────

#[test]
fn valves_start_closed_at_their_off_levels() {
    let hw = adapter(20, 21);
    assert!(sim_gpio_level(20));
    assert!(!sim_gpio_level(21));
    for valve in Valve::ALL {
        assert_eq!(hw.is_valve_open(valve), Ok(false));
    }
    assert_eq!(hw.relays().len(), 2);
    assert!(safety::registered_relays() >= 2);
}

#[test]
fn polarity_is_applied_per_valve() {
    let mut hw = adapter(22, 23);

    hw.set_valve(Valve::Inlet, true).unwrap();
    assert!(!sim_gpio_level(22));
    hw.set_valve(Valve::Outlet, true).unwrap();
    assert!(sim_gpio_level(23));

    hw.close_all();
    assert!(sim_gpio_level(22));
    assert!(!sim_gpio_level(23));
    assert_eq!(hw.is_valve_open(Valve::Inlet), Ok(false));
}

#[test]
fn unwritable_gpio_fails_registration() {
    let result = HardwareAdapter::with_valves(
        PressureSensor::new(&SensorConfig::default()),
        &relay_config(70, 24),
        GpioOutput::new(70),
        GpioOutput::new(24),
        NoDelay::default(),
    );
    assert!(matches!(result, Err(RelayError::GpioWriteFailed)));
}

#[test]
fn delay_is_delegated() {
    let delay = NoDelay::default();
    let mut hw = adapter_with(25, 26, delay.clone());
    hw.sleep_secs(1.5);
    hw.sleep_secs(0.5);
    assert_eq!(delay.slept.get(), 2.0);
}

// ── Sensor ────────────────────────────────────────────────────

// The simulated ADC is process-global; everything that reads it lives in
// this one test.
#[test]
fn simulated_vessel_at_default_target() {
    let mut hw = adapter(27, 28);

    sim_set_adc_fault(false);
    sim_set_pressure_adc(1458);
    let p = hw.read_pressure().unwrap();
    assert!((p - 32.0).abs() < 0.05, "pressure {}", p);
    assert_eq!(hw.units(), "PSI");

    // already at the boot target: no valve moves
    let mut sink = RecordingSink::new();
    let mut app = AppService::new(SystemConfig::default());
    let reply = app
        .handle_command(AppCommand::ReachTarget(32.0), &mut hw, &mut sink)
        .unwrap();
    assert!(matches!(
        reply,
        CommandReply::Session(Outcome::AlreadyAtTarget { .. })
    ));
    assert!(sim_gpio_level(27));
    assert!(!sim_gpio_level(28));

    sim_set_adc_fault(true);
    assert_eq!(hw.read_pressure(), Err(SensorError::AdcReadFailed));
    sim_set_adc_fault(false);
}
