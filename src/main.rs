//! AutoCompressor Firmware — Main Entry Point
//!
//! Blocking, single-task control of a tyre inflator.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        LogEventSink   NvsAdapter  SystemDelay │
//! │  (Pressure+Valve+Delay) (EventSink)    (Config+NVS) (Delay)    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  AutoCompressor · gas-state estimation                 │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  safety: relay off-levels + panic fail-safe                    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use autocompressor::adapters::hardware::HardwareAdapter;
use autocompressor::adapters::log_sink::LogEventSink;
use autocompressor::adapters::nvs::NvsAdapter;
use autocompressor::adapters::time::SystemDelay;
use autocompressor::app::commands::AppCommand;
use autocompressor::app::ports::{ConfigPort, ValvePort};
use autocompressor::app::service::AppService;
use autocompressor::config::SystemConfig;
use autocompressor::drivers::hw_init::{self, GpioOutput, RelayLine};
use autocompressor::safety;
use autocompressor::sensors::{PressureSensor, SensorCalibration};

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AutoCompressor v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::detached()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    if let Some(level) = config.log_level() {
        log::set_max_level(level);
    }

    // ── 3. Fail-safe before any relay output exists ───────────
    safety::install_failsafe_hook();

    // ── 4. Initialise hardware peripherals ────────────────────
    let relays = &config.relays;
    let lines = [
        RelayLine {
            gpio: relays.inlet_gpio,
            off_high: relays.inlet_off_high,
        },
        RelayLine {
            gpio: relays.outlet_gpio,
            off_high: relays.outlet_off_high,
        },
    ];
    hw_init::init_peripherals(config.sensor.adc_channel, &lines)
        .map_err(|e| anyhow::anyhow!("HAL init failed: {}", e))?;

    // ── 5. Construct adapters ─────────────────────────────────
    let mut sensor = PressureSensor::new(&config.sensor);
    match SensorCalibration::load(&nvs) {
        Ok(cal) => sensor.set_calibration(cal),
        // missing, corrupt or not in PSI
        Err(e) => {
            info!("No usable stored sensor calibration ({}), using configured line", e);
            if let Err(e) = sensor.calibration().save(&mut nvs) {
                warn!("Could not persist sensor calibration: {}", e);
            }
        }
    }

    let mut hw = HardwareAdapter::with_valves(
        sensor,
        relays,
        GpioOutput::new(relays.inlet_gpio),
        GpioOutput::new(relays.outlet_gpio),
        SystemDelay::new(),
    )
    .map_err(|e| anyhow::anyhow!("relay registration failed: {}", e))?;

    let mut log_sink = LogEventSink::new();

    // ── 6. Construct app service and run the boot session ─────
    let mut app = AppService::new(config.clone());
    app.start(&mut log_sink);

    info!(
        "Attempting to reach a target of {}{}",
        config.default_target, config.sensor.units
    );
    let boot = AppCommand::ReachTarget(config.default_target);
    match app.handle_command(boot, &mut hw, &mut log_sink) {
        Ok(reply) => info!("Session finished: {:?}", reply),
        Err(e) => error!("Encountered an error: {}", e),
    }

    // Every exit path leaves the valves closed.
    hw.close_all();
    app.save_if_dirty(&nvs);

    // ── 7. Idle ───────────────────────────────────────────────
    info!("Idle; valves closed");
    loop {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(1_000);
    }
}
