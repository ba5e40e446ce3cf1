//! Unit conversions and ideal-gas relations.
//!
//! Everything here is pure: no hardware, no state.  The estimator and the
//! control loop assume a fixed temperature and a fixed vessel volume
//! between probes, so `pV = nRT` reduces to the proportionalities below.
//!
//! Fallible relations return [`EstimateFault`] instead of letting a zero
//! divisor turn into `NaN`/`Inf` further down the loop.

use log::trace;

use crate::error::EstimateFault;

/// Pascals per PSI.
pub const PA_PER_PSI: f64 = 6894.76;

/// Offset between degrees Celsius and kelvin.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Average molar density of air, mol per litre.
pub const MOLS_PER_LITRE: f64 = 0.0042;

/// Conversion factor applied to L/s flow ratings (`0.0042 mol/L * 10^3`).
pub const LITRES_TO_MOLS: f64 = MOLS_PER_LITRE * 1000.0;

/// Universal gas constant (m³·Pa·mol⁻¹·K⁻¹).
pub const GAS_CONSTANT: f64 = 8.3145;

// ── Conversions ───────────────────────────────────────────────

pub fn psi_to_pa(psi: f64) -> f64 {
    psi * PA_PER_PSI
}

pub fn pa_to_psi(pa: f64) -> f64 {
    pa / PA_PER_PSI
}

pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}

/// Convert a volumetric flow rating (L/s) to a molar flow (mol/s).
pub fn litres_per_sec_to_mol_per_sec(rate: f64) -> f64 {
    let result = rate * LITRES_TO_MOLS;
    trace!("{} L/s to mols = {}", rate, result);
    result
}

/// Inverse of [`litres_per_sec_to_mol_per_sec`].
pub fn mol_per_sec_to_litres_per_sec(rate: f64) -> f64 {
    rate / LITRES_TO_MOLS
}

// ── Ideal gas law ─────────────────────────────────────────────

/// `n = pV / RT`
pub fn ideal_gas_mols(volume_m3: f64, pressure_pa: f64, temperature_k: f64) -> f64 {
    let result = (pressure_pa * volume_m3) / (GAS_CONSTANT * temperature_k);
    trace!(
        "Determine mols: (v, p, T) ({}, {}, {}) = {}",
        volume_m3, pressure_pa, temperature_k, result
    );
    result
}

/// `V = nRT / p`
pub fn ideal_gas_volume(pressure_pa: f64, mols: f64, temperature_k: f64) -> f64 {
    let result = (mols * GAS_CONSTANT * temperature_k) / pressure_pa;
    trace!(
        "Determine volume: (p, n, T) ({}, {}, {}) = {}",
        pressure_pa, mols, temperature_k, result
    );
    result
}

/// Mols present before a burst of `duration_s` at `flow_mol_s` moved the
/// pressure from `p1_pa` to `p2_pa`:
///
/// ```text
/// n = flow * p1 * t
///     -------------
///        p2 - p1
/// ```
pub fn mols_from_pressure_diff(
    p1_pa: f64,
    p2_pa: f64,
    duration_s: f64,
    flow_mol_s: f64,
) -> Result<f64, EstimateFault> {
    if flow_mol_s == 0.0 {
        return Err(EstimateFault::ZeroFlowRate);
    }
    if p2_pa == p1_pa {
        return Err(EstimateFault::ZeroPressureDelta);
    }
    let result = (flow_mol_s * p1_pa * duration_s) / (p2_pa - p1_pa);
    trace!(
        "Calculate mols pressure difference: (p1, p2, flow_rate) ({}, {}, {}) = {}",
        p1_pa, p2_pa, flow_mol_s, result
    );
    finite(result)
}

/// Seconds of flow at `flow_mol_s` needed to move `mols` of gas from
/// `p1_pa` to `p2_pa`:
///
/// ```text
/// t = n * (p2 - p1)
///     -------------
///      flow * p1
/// ```
///
/// The result is negative when the flow direction does not match the
/// pressure delta; callers must reject it rather than sleep on it.
pub fn est_time_to_target(
    p1_pa: f64,
    p2_pa: f64,
    mols: f64,
    flow_mol_s: f64,
) -> Result<f64, EstimateFault> {
    if flow_mol_s == 0.0 {
        return Err(EstimateFault::ZeroFlowRate);
    }
    if p1_pa == 0.0 {
        return Err(EstimateFault::ZeroPressure);
    }
    let result = (mols * (p2_pa - p1_pa)) / (flow_mol_s * p1_pa);
    trace!(
        "Est. time to target: (p1, p2, n0, flow_rate) ({}, {}, {}, {}) = {}",
        p1_pa, p2_pa, mols, flow_mol_s, result
    );
    finite(result)
}

/// Molar flow observed when `mols` of gas moved from `p1_pa` to `p2_pa`
/// over `duration_s`:
///
/// ```text
/// flow = n * (p2 - p1)
///        -------------
///           p1 * t
/// ```
pub fn flow_rate_from_pressure_diff(
    p1_pa: f64,
    p2_pa: f64,
    duration_s: f64,
    mols: f64,
) -> Result<f64, EstimateFault> {
    if p1_pa == 0.0 {
        return Err(EstimateFault::ZeroPressure);
    }
    if duration_s == 0.0 {
        return Err(EstimateFault::NonFinite);
    }
    let result = (mols * (p2_pa - p1_pa)) / (p1_pa * duration_s);
    trace!(
        "Calculate flow rate: (p1, p2, t, n0) ({}, {}, {}, {}) = {}",
        p1_pa, p2_pa, duration_s, mols, result
    );
    finite(result)
}

fn finite(value: f64) -> Result<f64, EstimateFault> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EstimateFault::NonFinite)
    }
}
