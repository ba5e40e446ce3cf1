//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! Session summaries are rendered as one JSON object per line so they can
//! be scraped off the console.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::control::SessionReport;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

/// Single-line JSON for a finished session.
pub fn report_json(report: &SessionReport) -> String {
    serde_json::to_string(report).unwrap_or_else(|_| String::from("{}"))
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { default_target } => {
                info!("START | default_target={}", default_target);
            }
            AppEvent::SessionStarted { target, pressure } => {
                info!("SESSION | target={} from={:.2}", target, pressure);
            }
            AppEvent::PhaseChanged { from, to } => {
                info!("PHASE | {:?} -> {:?}", from, to);
            }
            AppEvent::ProbeCompleted { gas, probe_secs } => {
                info!(
                    "PROBE | {:.1}s | volume={:.6}m3 mols={:.3} T={:.2}K",
                    probe_secs, gas.volume_m3, gas.mols, gas.temperature_k
                );
            }
            AppEvent::RoundCompleted {
                round,
                pressure,
                direction,
                secs,
            } => {
                info!(
                    "ROUND {} | {:?} {:.2}s from {:.2}",
                    round, direction, secs, pressure
                );
            }
            AppEvent::TargetReached(report) => {
                info!("REPORT | {}", report_json(report));
            }
            AppEvent::AlreadyAtTarget { pressure } => {
                info!("SESSION | already at target ({:.2})", pressure);
            }
            AppEvent::OutflowCalibrated(fit) => {
                info!(
                    "OUTFLOW | m={:e} c={:.4} samples={}",
                    fit.m, fit.c, fit.samples
                );
            }
            AppEvent::ConfigUpdated => {
                info!("CONFIG | updated");
            }
            AppEvent::Aborted(e) => {
                error!("ABORT | {}", e);
            }
            AppEvent::ValvesClosed => {
                warn!("VALVES | all closed");
            }
        }
    }
}
