//! End-to-end control-loop sessions against a scripted vessel.
//!
//! Readings are consumed in this order: start reading, probe result,
//! volume reading, rounded progress reading, then one reading per round.

use crate::mock_hw::{HwCall, MockVessel, RecordingSink};
use autocompressor::app::events::AppEvent;
use autocompressor::app::ports::{DelayPort, PressurePort, Valve, ValvePort};
use autocompressor::config::ControlConfig;
use autocompressor::control::physics::{
    celsius_to_kelvin, litres_per_sec_to_mol_per_sec, pa_to_psi, psi_to_pa, GAS_CONSTANT,
};
use autocompressor::control::{AutoCompressor, Direction, OutflowModel, Outcome, Phase};
use autocompressor::error::{ControlError, Error, RelayError, SensorError};

fn compressor() -> AutoCompressor {
    AutoCompressor::new(&ControlConfig::default())
}

fn assert_secs(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "bursts {:?}", actual);
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-6, "burst {} != {}", a, e);
    }
}

fn phases(sink: &RecordingSink) -> Vec<Phase> {
    sink.events
        .iter()
        .filter_map(|e| match e {
            AppEvent::PhaseChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

// ── Inflation ─────────────────────────────────────────────────

#[test]
fn inflation_settles_within_margin() {
    let mut hw = MockVessel::scripted(&[10.0, 12.0, 12.0, 12.0, 12.0, 28.0, 38.0, 40.0]);
    let mut sink = RecordingSink::new();
    let outcome = compressor().reach_target(&mut hw, 40.0, &mut sink).unwrap();

    let Outcome::Settled(report) = outcome else {
        panic!("expected a settled session, got {:?}", outcome);
    };
    // probe, then 28 s at 12 PSI, 12 s at 28 PSI and 2 s at 38 PSI
    assert_secs(&hw.inflates(), &[2.0, 28.0, 12.0, 2.0]);
    assert!(hw.deflates().is_empty());
    assert_eq!(report.rounds, 3);
    assert!((report.time_taken_secs - 42.0).abs() < 1e-6);
    assert_eq!(report.start_pressure, 10.0);
    assert_eq!(report.final_pressure, 40.0);
    assert!(report.gas.volume_m3 > 0.0);
    assert!(!hw.any_valve_open());
    assert_eq!(
        phases(&sink),
        [Phase::Probing, Phase::Correcting, Phase::Settled]
    );
}

#[test]
fn every_reading_is_taken_with_valves_closed() {
    let mut hw = MockVessel::scripted(&[10.0, 12.0, 12.0, 12.0, 12.0, 28.0, 38.0, 40.0]);
    let mut sink = RecordingSink::new();
    compressor().reach_target(&mut hw, 40.0, &mut sink).unwrap();

    let mut inlet = false;
    let mut outlet = false;
    for call in &hw.calls {
        match *call {
            HwCall::SetValve { valve: Valve::Inlet, open } => inlet = open,
            HwCall::SetValve { valve: Valve::Outlet, open } => outlet = open,
            HwCall::Read(_) => assert!(!inlet && !outlet, "read with a valve open"),
            _ => {}
        }
    }
}

// ── Deflation ─────────────────────────────────────────────────

#[test]
fn deflation_uses_outlet_only() {
    let mut hw = MockVessel::scripted(&[40.0, 38.0, 38.0, 38.0, 38.0, 20.0, 10.0]);
    let mut sink = RecordingSink::new();
    let outcome = compressor().reach_target(&mut hw, 10.0, &mut sink).unwrap();

    assert!(matches!(outcome, Outcome::Settled(r) if r.rounds == 2));
    assert_secs(&hw.deflates(), &[2.0, 28.0, 10.0]);
    assert!(hw.inflates().is_empty());
}

// ── Overshoot ─────────────────────────────────────────────────

#[test]
fn overshoot_is_corrected_in_the_other_direction() {
    let mut hw =
        MockVessel::scripted(&[10.0, 12.0, 12.0, 12.0, 12.0, 28.0, 50.0, 36.0, 40.0]);
    let mut sink = RecordingSink::new();
    let outcome = compressor().reach_target(&mut hw, 40.0, &mut sink).unwrap();

    let Outcome::Settled(report) = outcome else {
        panic!("expected a settled session, got {:?}", outcome);
    };
    assert_secs(&hw.inflates(), &[2.0, 28.0, 12.0, 4.0]);
    assert_secs(&hw.deflates(), &[10.0]);
    assert_eq!(report.rounds, 4);

    let directions: Vec<Direction> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::RoundCompleted { direction, .. } => Some(*direction),
            _ => None,
        })
        .collect();
    assert_eq!(
        directions,
        [
            Direction::Inflate,
            Direction::Inflate,
            Direction::Deflate,
            Direction::Inflate
        ]
    );
}

// ── Edge cases ────────────────────────────────────────────────

#[test]
fn already_at_target_moves_no_air() {
    let mut hw = MockVessel::scripted(&[31.6]);
    let mut sink = RecordingSink::new();
    let outcome = compressor().reach_target(&mut hw, 32.0, &mut sink).unwrap();

    assert_eq!(outcome, Outcome::AlreadyAtTarget { pressure: 31.6 });
    assert!(hw.inflates().is_empty() && hw.deflates().is_empty());
    assert!(sink.contains(|e| matches!(e, AppEvent::AlreadyAtTarget { .. })));
    assert_eq!(phases(&sink), [Phase::Settled]);
}

#[test]
fn flat_probe_retries_with_doubled_duration() {
    // 10 -> 10 (no change), then 10 -> 12 after a 4 s probe
    let mut hw = MockVessel::scripted(&[10.0, 10.0, 12.0, 12.0, 12.0, 12.0, 40.0]);
    let mut sink = RecordingSink::new();
    let outcome = compressor().reach_target(&mut hw, 40.0, &mut sink).unwrap();

    assert!(matches!(outcome, Outcome::Settled(_)));
    assert_eq!(hw.inflates()[..2], [2.0, 4.0]);
    assert!(sink.contains(|e| matches!(
        e,
        AppEvent::ProbeCompleted { probe_secs, .. } if (*probe_secs - 6.0).abs() < 1e-9
    )));
}

#[test]
fn stuck_vessel_gives_up_after_round_budget() {
    let config = ControlConfig {
        max_rounds: 3,
        ..ControlConfig::default()
    };
    let mut hw = MockVessel::scripted(&[10.0, 12.0]);
    let mut sink = RecordingSink::new();
    let err = AutoCompressor::new(&config)
        .reach_target(&mut hw, 40.0, &mut sink)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Control(ControlError::NonConvergence { rounds: 3, .. })
    ));
    // probe plus three identical 28 s corrections
    assert_secs(&hw.inflates(), &[2.0, 28.0, 28.0, 28.0]);
    assert_eq!(phases(&sink).last(), Some(&Phase::Error));
    assert!(!hw.any_valve_open());
}

#[test]
fn reading_fault_aborts_session() {
    let mut hw = MockVessel::scripted(&[10.0, 12.0]).failing_after(2);
    let mut sink = RecordingSink::new();
    let err = compressor().reach_target(&mut hw, 40.0, &mut sink).unwrap_err();

    assert!(matches!(err, Error::Sensor(_)));
    assert_eq!(phases(&sink), [Phase::Probing, Phase::Error]);
}

#[test]
fn stuck_sensor_stays_within_time_budget() {
    let config = ControlConfig {
        // more retries than validation allows, so only the budget stops it
        probe_retries: 20,
        ..ControlConfig::default()
    };
    let mut hw = MockVessel::scripted(&[10.0]);
    let mut sink = RecordingSink::new();
    let err = AutoCompressor::new(&config)
        .reach_target(&mut hw, 40.0, &mut sink)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Control(ControlError::NonConvergence { rounds: 0, .. })
    ));
    // 2 + 4 + ... + 256 s; the 512 s attempt would pass 600 s
    let open: f64 = hw.inflates().iter().sum();
    assert!((open - 510.0).abs() < 1e-9, "open for {}", open);
    assert!(open <= config.max_total_secs);
    assert!(!hw.any_valve_open());
}

// ── Pressure-dependent venting ────────────────────────────────

/// A fixed-volume vessel whose vent passes `m·p + c` L/s, so it empties
/// faster at high pressure and slows down as it drains.
struct VentingVessel {
    volume_m3: f64,
    temperature_k: f64,
    mols: f64,
    inflow_l_s: f64,
    outflow: OutflowModel,
    inlet: bool,
    outlet: bool,
    deflates: Vec<f64>,
}

impl VentingVessel {
    fn new(psi: f64, volume_m3: f64, config: &ControlConfig) -> Self {
        let temperature_k = celsius_to_kelvin(config.temperature_c);
        Self {
            volume_m3,
            temperature_k,
            mols: psi_to_pa(psi) * volume_m3 / (GAS_CONSTANT * temperature_k),
            inflow_l_s: config.flow_rate_in,
            outflow: config.outflow,
            inlet: false,
            outlet: false,
            deflates: Vec::new(),
        }
    }

    fn pressure_pa(&self) -> f64 {
        self.mols * GAS_CONSTANT * self.temperature_k / self.volume_m3
    }
}

impl PressurePort for VentingVessel {
    fn read_pressure(&mut self) -> Result<f64, SensorError> {
        Ok(pa_to_psi(self.pressure_pa()))
    }

    fn units(&self) -> &str {
        "PSI"
    }
}

impl ValvePort for VentingVessel {
    fn set_valve(&mut self, valve: Valve, open: bool) -> Result<(), RelayError> {
        match valve {
            Valve::Inlet => self.inlet = open,
            Valve::Outlet => self.outlet = open,
        }
        Ok(())
    }

    fn is_valve_open(&self, valve: Valve) -> Result<bool, RelayError> {
        Ok(match valve {
            Valve::Inlet => self.inlet,
            Valve::Outlet => self.outlet,
        })
    }

    fn close_all(&mut self) {
        self.inlet = false;
        self.outlet = false;
    }
}

impl DelayPort for VentingVessel {
    fn sleep_secs(&mut self, secs: f64) {
        if self.outlet {
            self.deflates.push(secs);
        }
        let steps = ((secs / 0.01).ceil() as usize).max(1);
        let dt = secs / steps as f64;
        for _ in 0..steps {
            if self.inlet {
                self.mols += litres_per_sec_to_mol_per_sec(self.inflow_l_s) * dt;
            } else if self.outlet {
                let litres = self.outflow.litres_per_sec(self.pressure_pa()).max(0.0);
                self.mols = (self.mols - litres_per_sec_to_mol_per_sec(litres) * dt).max(0.0);
            }
        }
    }
}

#[test]
fn linear_outflow_deflation_settles() {
    let config = ControlConfig {
        outflow: OutflowModel::Linear { m: 2e-6, c: 0.05 },
        ..ControlConfig::default()
    };
    let mut hw = VentingVessel::new(40.0, 1.0, &config);
    let mut sink = RecordingSink::new();
    let outcome = AutoCompressor::new(&config)
        .reach_target(&mut hw, 20.0, &mut sink)
        .unwrap();

    let Outcome::Settled(report) = outcome else {
        panic!("expected a settled session, got {:?}", outcome);
    };
    assert!((report.final_pressure - 20.0).abs() <= config.error_margin);
    // the vent slows as it drains, so the first estimate falls short
    assert!(
        report.rounds >= 2 && report.rounds <= config.max_rounds,
        "rounds {}",
        report.rounds
    );
    assert!(!hw.deflates.is_empty());
    for secs in &hw.deflates {
        assert!(*secs > 0.0 && *secs < 150.0, "deflate of {}s", secs);
    }
    assert!(!hw.inlet && !hw.outlet);
}
