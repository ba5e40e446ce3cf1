//! The `reach_target` control loop.
//!
//! ```text
//!   Init ──▶ Probing ──▶ Correcting ──▶ Settled
//!    │          │            │ ▲
//!    │          │            └─┘ one burst per round
//!    └──────────┴────────────┴──▶ Error
//! ```
//!
//! * **Init** — read the vessel, validate the target, stop early if the
//!   rounded reading already matches it.
//! * **Probing** — one probe burst estimates the enclosed mols; the vessel
//!   volume derived from it is frozen for the rest of the session.
//! * **Correcting** — each round recomputes the mols from the frozen volume
//!   and the latest reading, estimates the burst needed to hit the target,
//!   and runs it.  Ends inside the error margin or when the round/time
//!   budget runs out.
//!
//! Hardware is reached only through the port traits; the caller threads a
//! single `&mut` handle through, so no two components can command a valve
//! at the same time.

use log::{debug, info, warn};
use serde::Serialize;

use super::actuator::{Direction, ValveActuator};
use super::estimator::{GasStateEstimator, ProbeResult};
use super::flow::FlowRates;
use super::physics::{
    celsius_to_kelvin, est_time_to_target, ideal_gas_mols, ideal_gas_volume, psi_to_pa,
};
use super::reader::PressureReader;
use crate::app::events::AppEvent;
use crate::app::ports::{DelayPort, EventSink, PressurePort, ValvePort};
use crate::config::ControlConfig;
use crate::error::{ControlError, EstimateFault, Result};

// ---------------------------------------------------------------------------
// Session data
// ---------------------------------------------------------------------------

/// Phases of a `reach_target` session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Init,
    Probing,
    Correcting,
    Settled,
    Error,
}

/// Estimated physical state of the air in the vessel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GasState {
    /// Vessel volume, frozen after the probe (m³).
    pub volume_m3: f64,
    /// Enclosed air at the latest reading (mol).
    pub mols: f64,
    /// Assumed constant gas temperature (K).
    pub temperature_k: f64,
}

/// Progress of one session; lives only for the duration of the call.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ControlSession {
    target: f64,
    error_margin: f64,
    rounds: u32,
    time_taken_secs: f64,
}

/// Summary of a session that reached its target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionReport {
    pub target: f64,
    pub start_pressure: f64,
    pub final_pressure: f64,
    /// Correction rounds, excluding the probe.
    pub rounds: u32,
    /// Estimated valve-open time over all correction rounds (s).
    pub time_taken_secs: f64,
    /// Probe time (s).
    pub probe_secs: f64,
    pub gas: GasState,
}

/// How a successful `reach_target` call ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// Nothing to do: the rounded reading already equalled the target.
    AlreadyAtTarget { pressure: f64 },
    /// The target was reached within the error margin.
    Settled(SessionReport),
}

// ---------------------------------------------------------------------------
// AutoCompressor
// ---------------------------------------------------------------------------

/// Drives a vessel to a target pressure using discrete valve bursts.
#[derive(Debug, Clone, Copy)]
pub struct AutoCompressor {
    reader: PressureReader,
    actuator: ValveActuator,
    estimator: GasStateEstimator,
    rates: FlowRates,
    error_margin: f64,
    temperature_k: f64,
    max_rounds: u32,
    max_total_secs: f64,
}

impl AutoCompressor {
    /// Build from an already validated [`ControlConfig`].
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            reader: PressureReader::new(config),
            actuator: ValveActuator::new(config),
            estimator: GasStateEstimator::new(config),
            rates: FlowRates::new(config.flow_rate_in, config.outflow),
            error_margin: config.error_margin,
            temperature_k: celsius_to_kelvin(config.temperature_c),
            max_rounds: config.max_rounds,
            max_total_secs: config.max_total_secs,
        }
    }

    pub fn reader(&self) -> &PressureReader {
        &self.reader
    }

    pub fn actuator(&self) -> &ValveActuator {
        &self.actuator
    }

    pub fn rates(&self) -> &FlowRates {
        &self.rates
    }

    pub fn temperature_k(&self) -> f64 {
        self.temperature_k
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn pressure_within_margin(&self, target: f64, pressure: f64) -> bool {
        (target - self.error_margin) <= pressure && pressure <= (target + self.error_margin)
    }

    /// Inflate or deflate the vessel to `target` (display units).
    pub fn reach_target(
        &self,
        hw: &mut (impl PressurePort + ValvePort + DelayPort),
        target: f64,
        sink: &mut impl EventSink,
    ) -> Result<Outcome> {
        let mut phase = Phase::Init;
        let result = self.run_session(hw, target, sink, &mut phase);
        if let Err(e) = &result {
            warn!("Session aborted in {:?}: {}", phase, e);
            Self::enter(&mut phase, Phase::Error, sink);
        }
        result
    }

    /// Probe the vessel and derive its gas state.
    ///
    /// `p_curr`/`p_target` are display units.  Returns the probe and the
    /// gas state at a fresh reading taken after it.
    pub fn estimate_gas_state(
        &self,
        hw: &mut (impl PressurePort + ValvePort + DelayPort),
        p_curr: f64,
        p_target: f64,
        duration: Option<f64>,
    ) -> Result<(ProbeResult, GasState)> {
        let probe = self.estimator.determine_current_mol(
            hw,
            psi_to_pa(p_curr),
            psi_to_pa(p_target),
            duration,
        )?;

        // determine current volume based off estimation
        let p_curr_pa = psi_to_pa(self.reader.read_pressure(hw, true)?);
        let volume_m3 = ideal_gas_volume(p_curr_pa, probe.mols, self.temperature_k);
        if !volume_m3.is_finite() {
            return Err(EstimateFault::NonFinite.into());
        }
        if volume_m3 <= 0.0 {
            return Err(EstimateFault::NonPositive.into());
        }
        debug!(
            "Estimated current mols as {} and volume as {} m3",
            probe.mols, volume_m3
        );

        Ok((
            probe,
            GasState {
                volume_m3,
                mols: probe.mols,
                temperature_k: self.temperature_k,
            },
        ))
    }

    // ── Internal ──────────────────────────────────────────────

    fn run_session(
        &self,
        hw: &mut (impl PressurePort + ValvePort + DelayPort),
        target: f64,
        sink: &mut impl EventSink,
        phase: &mut Phase,
    ) -> Result<Outcome> {
        // ── Init ──────────────────────────────────────────────
        let start = self.reader.read_pressure(hw, true)?;
        let units = hw.units().to_owned();
        info!(
            "Inflate/deflate to target {}{} from {:.2}{}",
            target, units, start, units
        );
        if !target.is_finite() || target <= 0.0 {
            return Err(ControlError::InvalidTarget.into());
        }
        sink.emit(&AppEvent::SessionStarted {
            target,
            pressure: start,
        });
        if start.round() == target.round() {
            info!(
                "Current reading of {}{} is already at target of {}{}",
                start.round(),
                units,
                target,
                units
            );
            Self::enter(phase, Phase::Settled, sink);
            sink.emit(&AppEvent::AlreadyAtTarget { pressure: start });
            return Ok(Outcome::AlreadyAtTarget { pressure: start });
        }

        // ── Probing ───────────────────────────────────────────
        Self::enter(phase, Phase::Probing, sink);
        let target_pa = psi_to_pa(target);
        let (probe, mut gas) = self.estimate_gas_state(hw, start, target, None)?;
        sink.emit(&AppEvent::ProbeCompleted {
            gas,
            probe_secs: probe.duration_secs,
        });

        let p_rounded = self.reader.read_pressure(hw, false)?;
        info!(
            "Time to start reaching the target pressure: {}{} -> {}{}",
            p_rounded, units, target, units
        );

        // ── Correcting ────────────────────────────────────────
        Self::enter(phase, Phase::Correcting, sink);
        let mut session = ControlSession {
            target,
            error_margin: self.error_margin,
            rounds: 0,
            time_taken_secs: 0.0,
        };

        loop {
            let p_curr = self.reader.read_pressure(hw, true)?;
            let p_curr_pa = psi_to_pa(p_curr);
            info!("Currently at {}{}", p_curr.round(), units);
            gas.mols = ideal_gas_mols(gas.volume_m3, p_curr_pa, gas.temperature_k);

            if self.pressure_within_margin(session.target, p_curr) {
                info!(
                    "Current pressure {}{} is within threshold of {}{} +/- {}",
                    p_curr, units, session.target, units, session.error_margin
                );
                info!(
                    "Target {}{} reached in {:.2}s and {} rounds",
                    session.target, units, session.time_taken_secs, session.rounds
                );
                let report = SessionReport {
                    target: session.target,
                    start_pressure: start,
                    final_pressure: p_curr,
                    rounds: session.rounds,
                    time_taken_secs: session.time_taken_secs,
                    probe_secs: probe.duration_secs,
                    gas,
                };
                Self::enter(phase, Phase::Settled, sink);
                sink.emit(&AppEvent::TargetReached(report));
                return Ok(Outcome::Settled(report));
            }

            if session.rounds >= self.max_rounds {
                return Err(Self::non_convergence(&session));
            }

            // inflation/deflation controls
            let (direction, flow) = if p_curr > session.target {
                (Direction::Deflate, self.rates.outflow_at(p_curr_pa)?)
            } else {
                (Direction::Inflate, self.rates.inflow()?)
            };

            let est_time = est_time_to_target(p_curr_pa, target_pa, gas.mols, flow)?;
            debug!("Estimated time to target is {:.0}s", est_time);
            if est_time < 0.0 {
                return Err(ControlError::InvalidDuration.into());
            }
            if session.time_taken_secs + est_time > self.max_total_secs {
                warn!(
                    "Next burst of {:.1}s would exceed the {:.0}s budget",
                    est_time, self.max_total_secs
                );
                return Err(Self::non_convergence(&session));
            }

            // correct vessel pressure
            self.actuator.burst(hw, direction, est_time, true)?;
            session.time_taken_secs += est_time;
            session.rounds += 1;
            sink.emit(&AppEvent::RoundCompleted {
                round: session.rounds,
                pressure: p_curr,
                direction,
                secs: est_time,
            });
        }
    }

    fn non_convergence(session: &ControlSession) -> crate::error::Error {
        ControlError::NonConvergence {
            rounds: session.rounds,
            elapsed_secs: session.time_taken_secs,
        }
        .into()
    }

    fn enter(phase: &mut Phase, next: Phase, sink: &mut impl EventSink) {
        if *phase != next {
            debug!("Session phase: {:?} -> {:?}", phase, next);
            sink.emit(&AppEvent::PhaseChanged {
                from: *phase,
                to: next,
            });
            *phase = next;
        }
    }
}
