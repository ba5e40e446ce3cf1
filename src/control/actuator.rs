//! Timed valve bursts.
//!
//! A burst opens one valve, holds it for the requested time, then
//! (optionally) closes it and waits for the vessel pressure to settle so
//! the next reading reflects the static post-burst state.

use log::debug;

use crate::app::ports::{DelayPort, Valve, ValvePort};
use crate::config::ControlConfig;
use crate::error::{ControlError, Result};

/// Which way a burst moves the vessel pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inflate,
    Deflate,
}

impl Direction {
    /// Valve that produces this direction of flow.
    pub const fn valve(self) -> Valve {
        match self {
            Self::Inflate => Valve::Inlet,
            Self::Deflate => Valve::Outlet,
        }
    }
}

/// Opens a valve for a duration and closes it again.
#[derive(Debug, Clone, Copy)]
pub struct ValveActuator {
    on_delay: f64,
    pressure_balance_delay: f64,
}

impl ValveActuator {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            on_delay: config.on_delay,
            pressure_balance_delay: config.pressure_balance_delay,
        }
    }

    pub fn inflate(
        &self,
        hw: &mut (impl ValvePort + DelayPort),
        secs: f64,
        close: bool,
    ) -> Result<()> {
        self.burst(hw, Direction::Inflate, secs, close)
    }

    pub fn deflate(
        &self,
        hw: &mut (impl ValvePort + DelayPort),
        secs: f64,
        close: bool,
    ) -> Result<()> {
        self.burst(hw, Direction::Deflate, secs, close)
    }

    /// Run one burst.  Negative or non-finite durations are rejected
    /// before any valve moves.
    pub fn burst(
        &self,
        hw: &mut (impl ValvePort + DelayPort),
        direction: Direction,
        secs: f64,
        close: bool,
    ) -> Result<()> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(ControlError::InvalidDuration.into());
        }
        let valve = direction.valve();
        debug!("{:?} for {:.2}s via {}", direction, secs, valve.channel_name());

        hw.set_valve(valve, true)?;
        hw.sleep_secs(secs + self.on_delay);

        if close {
            hw.set_valve(valve, false)?;
            // Wait for pressure to stabilise before finishing
            hw.sleep_secs(self.pressure_balance_delay);
        }
        Ok(())
    }
}
