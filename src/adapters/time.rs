//! Blocking delay adapter.
//!
//! Every wait in the control loop (burst hold time, pressure settling)
//! is a plain blocking delay on the calling task.
//!
//! - **`target_os = "espidf"`** — `vTaskDelay` through
//!   `esp_idf_svc::hal::delay::FreeRtos`, so other FreeRTOS tasks (idle,
//!   watchdog feeders) keep running while a valve is held open.
//! - **`not(target_os = "espidf")`** — `std::thread::sleep` for host-side
//!   simulation.
//!
//! Also exposes an [`embedded_hal::delay::DelayNs`] implementation so
//! the same delay can be handed to embedded-hal drivers.

use crate::app::ports::DelayPort;

/// Longest single sleep issued to the OS (ms); longer waits are chunked.
const MAX_SLEEP_CHUNK_MS: u32 = 60_000;

/// Convert seconds to whole milliseconds.  Negative or NaN is zero.
pub fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_nan() || secs <= 0.0 {
        return 0;
    }
    let ms = (secs * 1000.0).round();
    if ms >= u64::MAX as f64 {
        u64::MAX
    } else {
        ms as u64
    }
}

/// Delay adapter for the ESP32 platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDelay;

impl SystemDelay {
    pub fn new() -> Self {
        Self
    }

    #[cfg(target_os = "espidf")]
    fn sleep_ms(ms: u32) {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn sleep_ms(ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

impl DelayPort for SystemDelay {
    fn sleep_secs(&mut self, secs: f64) {
        let mut remaining = secs_to_ms(secs);
        while remaining > 0 {
            let chunk = remaining.min(u64::from(MAX_SLEEP_CHUNK_MS)) as u32;
            Self::sleep_ms(chunk);
            remaining -= u64::from(chunk);
        }
    }
}

impl embedded_hal::delay::DelayNs for SystemDelay {
    fn delay_ns(&mut self, ns: u32) {
        // FreeRTOS ticks are milliseconds; round sub-ms waits up.
        Self::sleep_ms(ns.div_ceil(1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        Self::sleep_ms(ms);
    }
}
