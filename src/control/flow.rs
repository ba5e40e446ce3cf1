//! Valve flow-rate models.
//!
//! Inflow through the compressor inlet is treated as a constant rating.
//! Outflow through the vent depends on the hardware: a plain orifice
//! vents faster at higher pressure, so besides a flat rating the outflow
//! can be modelled as a line over absolute pressure (`m·p + c`, L/s).
//! Which model is used is a configuration choice.
//!
//! Sign convention: inflow is positive mol/s, outflow negative.

use serde::{Deserialize, Serialize};

use super::physics::litres_per_sec_to_mol_per_sec;
use crate::error::EstimateFault;

/// Outflow rating of the vent valve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutflowModel {
    /// Flat rating independent of vessel pressure.
    Constant { litres_per_sec: f64 },
    /// `litres_per_sec = m * pressure_pa + c`.
    Linear { m: f64, c: f64 },
}

impl OutflowModel {
    /// Volumetric vent rate at the given absolute pressure (L/s, positive).
    pub fn litres_per_sec(&self, pressure_pa: f64) -> f64 {
        match *self {
            Self::Constant { litres_per_sec } => litres_per_sec,
            Self::Linear { m, c } => m * pressure_pa + c,
        }
    }
}

impl Default for OutflowModel {
    fn default() -> Self {
        Self::Constant {
            litres_per_sec: 0.5,
        }
    }
}

/// Resolved flow rates used by the estimator and the control loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowRates {
    inflow_mol_s: f64,
    outflow: OutflowModel,
}

impl FlowRates {
    /// `inflow_litres_per_sec` is converted to mol/s once, here.
    pub fn new(inflow_litres_per_sec: f64, outflow: OutflowModel) -> Self {
        Self {
            inflow_mol_s: litres_per_sec_to_mol_per_sec(inflow_litres_per_sec),
            outflow,
        }
    }

    /// Inflow rate (mol/s, positive).
    pub fn inflow(&self) -> Result<f64, EstimateFault> {
        if self.inflow_mol_s == 0.0 {
            return Err(EstimateFault::ZeroFlowRate);
        }
        if !self.inflow_mol_s.is_finite() || self.inflow_mol_s < 0.0 {
            return Err(EstimateFault::NonPositive);
        }
        Ok(self.inflow_mol_s)
    }

    /// Outflow rate at `pressure_pa` (mol/s, negative).
    ///
    /// A linear model can evaluate to zero or below outside the pressure
    /// range it was fitted on; that is reported instead of flipping the
    /// flow direction.
    pub fn outflow_at(&self, pressure_pa: f64) -> Result<f64, EstimateFault> {
        let litres = self.outflow.litres_per_sec(pressure_pa);
        if litres == 0.0 {
            return Err(EstimateFault::ZeroFlowRate);
        }
        if !litres.is_finite() || litres < 0.0 {
            return Err(EstimateFault::NonPositive);
        }
        Ok(-litres_per_sec_to_mol_per_sec(litres))
    }

    pub fn outflow_model(&self) -> OutflowModel {
        self.outflow
    }
}
