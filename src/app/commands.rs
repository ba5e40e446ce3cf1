//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (boot sequence,
//! serial console, tests) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.

use crate::config::SystemConfig;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Inflate or deflate the vessel to a target pressure (display units).
    ReachTarget(f64),

    /// Characterise the outlet between two pressures.  With `apply`, the
    /// fitted line replaces the configured outflow model.
    CalibrateOutflow {
        start: f64,
        final_pressure: f64,
        interval_secs: f64,
        apply: bool,
    },

    /// Close every valve immediately.
    CloseAllValves,

    /// Hot-reload configuration.  Rejected unless it validates.
    UpdateConfig(SystemConfig),
}
