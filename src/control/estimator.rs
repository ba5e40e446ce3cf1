//! Gas-state estimation by probe burst.
//!
//! Neither the enclosed amount of air nor the vessel volume can be
//! measured directly.  A short burst of known duration and known flow rate
//! moves the pressure by a measurable amount; the ideal gas law then gives
//! the amount of air that must have been present before the burst.
//!
//! The probe always runs in the direction the session will move overall,
//! so the estimate is taken with the flow that dominates the correction.

use log::{debug, trace, warn};

use super::actuator::{Direction, ValveActuator};
use super::flow::FlowRates;
use super::physics::{mols_from_pressure_diff, pa_to_psi, psi_to_pa};
use super::reader::PressureReader;
use crate::app::ports::{DelayPort, PressurePort, ValvePort};
use crate::config::ControlConfig;
use crate::error::{ControlError, EstimateFault, Result};

/// Result of a probe: the burst that was run and the mols after it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    pub direction: Direction,
    /// Total probe time over every attempt (s).
    pub duration_secs: f64,
    /// Absolute pressure read after the final attempt (Pa).
    pub pressure_pa: f64,
    /// Mols in the vessel after the final attempt.
    pub mols: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct GasStateEstimator {
    init_inflate_secs: f64,
    init_deflate_secs: f64,
    retries: u8,
    max_total_secs: f64,
    rates: FlowRates,
    actuator: ValveActuator,
    reader: PressureReader,
}

impl GasStateEstimator {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            init_inflate_secs: config.init_check_inflate,
            init_deflate_secs: config.init_check_deflate,
            retries: config.probe_retries,
            max_total_secs: config.max_total_secs,
            rates: FlowRates::new(config.flow_rate_in, config.outflow),
            actuator: ValveActuator::new(config),
            reader: PressureReader::new(config),
        }
    }

    /// Mols in the vessel after a probe burst toward `p_target_pa`.
    ///
    /// Pressures are absolute (Pa).  `duration` overrides the configured
    /// probe time.  A probe that leaves the reading unchanged is repeated
    /// with twice the duration, up to the configured number of retries.
    /// No attempt starts that would take the total estimation time past the
    /// session time budget.
    pub fn determine_current_mol(
        &self,
        hw: &mut (impl PressurePort + ValvePort + DelayPort),
        p_curr_pa: f64,
        p_target_pa: f64,
        duration: Option<f64>,
    ) -> Result<ProbeResult> {
        let (direction, base_secs) = if p_curr_pa > p_target_pa {
            (Direction::Deflate, self.init_deflate_secs)
        } else {
            (Direction::Inflate, self.init_inflate_secs)
        };
        let mut secs = duration.unwrap_or(base_secs);
        let mut p_before = p_curr_pa;
        let mut total_secs = 0.0;
        let mut attempt = 0;

        loop {
            if total_secs + secs > self.max_total_secs {
                warn!(
                    "Estimation burst of {:.1}s would exceed the {:.0}s budget after {:.1}s",
                    secs, self.max_total_secs, total_secs
                );
                return Err(ControlError::NonConvergence {
                    rounds: 0,
                    elapsed_secs: total_secs,
                }
                .into());
            }
            let flow = match direction {
                Direction::Deflate => self.rates.outflow_at(p_before)?,
                Direction::Inflate => self.rates.inflow()?,
            };
            trace!(
                "Performing initial estimation using {:?} for {}s (flow {} mol/s)",
                direction, secs, flow
            );
            self.actuator.burst(hw, direction, secs, true)?;
            total_secs += secs;

            let p_now = psi_to_pa(self.reader.read_pressure(hw, true)?);
            match mols_from_pressure_diff(p_before, p_now, secs, flow) {
                Ok(n0) => {
                    let mols = n0 + flow * secs;
                    if n0 <= 0.0 || mols <= 0.0 {
                        warn!(
                            "Probe moved pressure the wrong way ({:.2} -> {:.2} PSI)",
                            pa_to_psi(p_before),
                            pa_to_psi(p_now)
                        );
                        return Err(EstimateFault::NonPositive.into());
                    }
                    debug!("Probe: n0 = {:.4} mol, after burst = {:.4} mol", n0, mols);
                    return Ok(ProbeResult {
                        direction,
                        duration_secs: total_secs,
                        pressure_pa: p_now,
                        mols,
                    });
                }
                Err(EstimateFault::ZeroPressureDelta) if attempt < self.retries => {
                    attempt += 1;
                    secs *= 2.0;
                    warn!(
                        "Probe showed no pressure change, retrying with {:.1}s ({}/{})",
                        secs, attempt, self.retries
                    );
                    p_before = p_now;
                }
                Err(fault) => return Err(ControlError::EstimationFailed(fault).into()),
            }
        }
    }
}
