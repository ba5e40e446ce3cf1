//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) and the control loop emit
//! these through the [`EventSink`](super::ports::EventSink) port.  Adapters
//! on the other side decide what to do with them (serial log, test
//! recorder).

use crate::control::{Direction, GasState, OutflowFit, Phase, SessionReport};
use crate::error::Error;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The application service is ready; carries the configured default target.
    Started { default_target: f64 },

    /// A `reach_target` session began from `pressure`.
    SessionStarted { target: f64, pressure: f64 },

    /// The session moved between control phases.
    PhaseChanged { from: Phase, to: Phase },

    /// The probe burst finished and the vessel volume is frozen.
    ProbeCompleted { gas: GasState, probe_secs: f64 },

    /// One correction burst ran.  `pressure` is the reading it was sized from.
    RoundCompleted {
        round: u32,
        pressure: f64,
        direction: Direction,
        secs: f64,
    },

    /// The target was reached within the error margin.
    TargetReached(SessionReport),

    /// The rounded reading already matched the target; nothing moved.
    AlreadyAtTarget { pressure: f64 },

    /// An outflow calibration produced a fit.
    OutflowCalibrated(OutflowFit),

    /// A validated configuration replaced the live one.
    ConfigUpdated,

    /// A command failed; valves are closed next.
    Aborted(Error),

    /// Every valve was commanded closed.
    ValvesClosed,
}
