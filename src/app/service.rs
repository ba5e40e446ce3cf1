//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the live configuration and the
//! [`AutoCompressor`] built from it.  It exposes a hardware-agnostic
//! command API; all I/O flows through port traits injected at call
//! sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  PressurePort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                   │       AppService        │
//!    ValvePort ◀──  │  AutoCompressor · cfg   │
//!                   └────────────────────────┘
//! ```
//!
//! Whatever a command does, a failed command leaves every valve closed.

use log::{error, info, warn};

use crate::config::SystemConfig;
use crate::control::{AutoCompressor, OutflowFit, Outcome};
use crate::error::Result;

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{ConfigPort, DelayPort, EventSink, PressurePort, ValvePort};

/// What a successful command produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandReply {
    Session(Outcome),
    Outflow(OutflowFit),
    Done,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: SystemConfig,
    compressor: AutoCompressor,
    sessions: u32,
    config_dirty: bool,
}

impl AppService {
    /// Construct the service from an already validated configuration.
    pub fn new(config: SystemConfig) -> Self {
        let compressor = AutoCompressor::new(&config.control);
        Self {
            config,
            compressor,
            sessions: 0,
            config_dirty: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started {
            default_target: self.config.default_target,
        });
        info!(
            "AppService started (default target {})",
            self.config.default_target
        );
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    ///
    /// The `hw` parameter satisfies every hardware port at once, so the
    /// control loop holds the only handle to the valves for the duration
    /// of the command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut (impl PressurePort + ValvePort + DelayPort),
        sink: &mut impl EventSink,
    ) -> Result<CommandReply> {
        let result = match cmd {
            AppCommand::ReachTarget(target) => {
                self.sessions += 1;
                self.compressor
                    .reach_target(hw, target, sink)
                    .map(CommandReply::Session)
            }
            AppCommand::CalibrateOutflow {
                start,
                final_pressure,
                interval_secs,
                apply,
            } => self
                .compressor
                .calibrate_outflow(hw, sink, start, final_pressure, interval_secs)
                .and_then(|fit| {
                    sink.emit(&AppEvent::OutflowCalibrated(fit));
                    if apply {
                        let mut config = self.config.clone();
                        config.control.outflow = fit.into_model();
                        self.apply_config(config, sink)?;
                    }
                    Ok(CommandReply::Outflow(fit))
                }),
            AppCommand::CloseAllValves => {
                hw.close_all();
                sink.emit(&AppEvent::ValvesClosed);
                Ok(CommandReply::Done)
            }
            AppCommand::UpdateConfig(config) => {
                self.apply_config(config, sink).map(|()| CommandReply::Done)
            }
        };

        if let Err(e) = &result {
            error!("Command failed: {}", e);
            sink.emit(&AppEvent::Aborted(*e));
            hw.close_all();
            sink.emit(&AppEvent::ValvesClosed);
        }
        result
    }

    // ── Queries ───────────────────────────────────────────────

    /// Clone of the live configuration.
    pub fn current_config(&self) -> SystemConfig {
        self.config.clone()
    }

    pub fn compressor(&self) -> &AutoCompressor {
        &self.compressor
    }

    /// `ReachTarget` commands handled since startup.
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_config(&mut self, config: SystemConfig, sink: &mut impl EventSink) -> Result<()> {
        config.validate()?;
        if let Some(level) = config.log_level() {
            log::set_max_level(level);
        }
        self.compressor = AutoCompressor::new(&config.control);
        self.config = config;
        self.mark_config_dirty();
        sink.emit(&AppEvent::ConfigUpdated);
        info!("Configuration updated at runtime");
        Ok(())
    }

    // ── Config dirty-flag management ──────────────────────────

    pub fn mark_config_dirty(&mut self) {
        self.config_dirty = true;
    }

    /// Persist the live config if it changed since the last save.
    /// Returns `true` if the config was saved.
    pub fn save_if_dirty(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config save failed: {}", e);
                false
            }
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
