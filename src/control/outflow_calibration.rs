//! Outflow characterisation.
//!
//! The outlet flow rate depends on the vessel pressure.  This routine
//! deflates from `start` down to `final` in fixed bursts, derives the flow
//! of each burst from the frozen vessel volume, and fits a straight line
//! through `(pressure Pa, flow L/s)`.  The result feeds
//! [`OutflowModel::Linear`].

use log::{debug, info};
use serde::Serialize;

use super::actuator::Direction;
use super::compressor::AutoCompressor;
use super::flow::OutflowModel;
use super::physics::{
    flow_rate_from_pressure_diff, ideal_gas_mols, mol_per_sec_to_litres_per_sec, psi_to_pa,
};
use crate::app::ports::{DelayPort, EventSink, PressurePort, ValvePort};
use crate::error::{ControlError, Result};
use crate::sensors::calibration::fit_linear;

/// Probe length used to size the vessel before calibrating (s).
const CALIBRATION_PROBE_SECS: f64 = 5.0;
/// Probe target above the current reading (display units).
const CALIBRATION_PROBE_HEADROOM: f64 = 5.0;

/// Least-squares fit of outlet flow against vessel pressure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutflowFit {
    /// Slope (L/s per Pa).
    pub m: f64,
    /// Intercept (L/s).
    pub c: f64,
    /// Bursts that contributed a sample.
    pub samples: usize,
}

impl OutflowFit {
    pub fn into_model(self) -> OutflowModel {
        OutflowModel::Linear {
            m: self.m,
            c: self.c,
        }
    }
}

impl AutoCompressor {
    /// Fit the outflow curve between `start` and `final_pressure`
    /// (display units) using deflation bursts of `interval` seconds.
    pub fn calibrate_outflow(
        &self,
        hw: &mut (impl PressurePort + ValvePort + DelayPort),
        sink: &mut impl EventSink,
        start: f64,
        final_pressure: f64,
        interval: f64,
    ) -> Result<OutflowFit> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(ControlError::InvalidDuration.into());
        }
        if !(final_pressure > 0.0 && start > final_pressure && start.is_finite()) {
            return Err(ControlError::InvalidTarget.into());
        }

        info!("Starting calibration for output flow rate");
        let p_curr = self.reader().read_pressure(hw, true)?;
        info!("Starting pressure is {} {}", p_curr.round(), hw.units());

        let (_, gas) = self.estimate_gas_state(
            hw,
            p_curr,
            p_curr + CALIBRATION_PROBE_HEADROOM,
            Some(CALIBRATION_PROBE_SECS),
        )?;

        let p_now = self.reader().read_pressure(hw, true)?;
        if !self.pressure_within_margin(start, p_now) {
            self.reach_target(hw, start, sink)?;
        }

        info!(
            "Performing deflation analysis every {}s till {} {}",
            interval,
            final_pressure,
            hw.units()
        );

        let mut samples: Vec<(f64, f64)> = Vec::new();
        let mut p_curr = self.reader().read_pressure(hw, true)?;
        let mut p_curr_pa = psi_to_pa(p_curr);
        while p_curr > final_pressure {
            if samples.len() >= self.max_rounds() as usize {
                return Err(ControlError::NonConvergence {
                    rounds: self.max_rounds(),
                    elapsed_secs: interval * samples.len() as f64,
                }
                .into());
            }
            let p_prev_pa = p_curr_pa;
            self.actuator().burst(hw, Direction::Deflate, interval, true)?;

            p_curr = self.reader().read_pressure(hw, true)?;
            p_curr_pa = psi_to_pa(p_curr);
            let mols = ideal_gas_mols(gas.volume_m3, p_curr_pa, gas.temperature_k);
            let flow = flow_rate_from_pressure_diff(p_prev_pa, p_curr_pa, interval, mols)?;
            // outflow is negative mol/s; the model stores a positive rate
            let litres_per_sec = mol_per_sec_to_litres_per_sec(-flow);
            debug!("{:.0} Pa: {:.4} L/s", p_curr_pa, litres_per_sec);
            samples.push((p_curr_pa, litres_per_sec));
        }

        let line = fit_linear(&samples)?;
        let fit = OutflowFit {
            m: line.m,
            c: line.c,
            samples: samples.len(),
        };
        info!(
            "Outflow fit: {:e} L/s per Pa + {:.4} L/s over {} samples",
            fit.m, fit.c, fit.samples
        );
        Ok(fit)
    }
}
