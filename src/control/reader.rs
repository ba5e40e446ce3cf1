//! Static pressure sampling.
//!
//! Opening or closing a valve leaves turbulence in the line, so a reading
//! is only trusted with both valves closed and after the settle delay.
//! Reading therefore closes any open valve first; callers must not read
//! in the middle of a burst they intend to keep open.

use log::trace;

use crate::app::ports::{DelayPort, PressurePort, Valve, ValvePort};
use crate::config::ControlConfig;
use crate::error::{Result, SensorError};

#[derive(Debug, Clone, Copy)]
pub struct PressureReader {
    pressure_balance_delay: f64,
}

impl PressureReader {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            pressure_balance_delay: config.pressure_balance_delay,
        }
    }

    /// Current vessel pressure in display units.
    ///
    /// `raw == false` rounds to the nearest whole unit (human-facing
    /// comparisons); `raw == true` keeps full precision for estimation.
    pub fn read_pressure(
        &self,
        hw: &mut (impl PressurePort + ValvePort + DelayPort),
        raw: bool,
    ) -> Result<f64> {
        let mut flow_changed = false;
        for valve in [Valve::Outlet, Valve::Inlet] {
            if hw.is_valve_open(valve)? {
                hw.set_valve(valve, false)?;
                flow_changed = true;
            }
        }

        if flow_changed {
            // allow pressure to settle
            hw.sleep_secs(self.pressure_balance_delay);
        }

        let pressure = hw.read_pressure()?;
        if !pressure.is_finite() {
            return Err(SensorError::OutOfRange.into());
        }
        trace!("Pressure reading {} {}", pressure, hw.units());

        Ok(if raw { pressure } else { pressure.round() })
    }
}
