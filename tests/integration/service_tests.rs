//! AppService command handling with mock adapters.

use crate::mock_hw::{MockNvs, MockVessel, RecordingSink};
use autocompressor::app::commands::AppCommand;
use autocompressor::app::events::AppEvent;
use autocompressor::app::ports::ConfigPort;
use autocompressor::app::service::{AppService, CommandReply};
use autocompressor::config::SystemConfig;
use autocompressor::control::flow::OutflowModel;
use autocompressor::control::Outcome;
use autocompressor::error::{ControlError, Error, SensorError};

fn make_app() -> (AppService, RecordingSink) {
    let mut sink = RecordingSink::new();
    let mut app = AppService::new(SystemConfig::default());
    app.start(&mut sink);
    (app, sink)
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_announces_default_target() {
    let (_, sink) = make_app();
    assert_eq!(
        sink.events,
        [AppEvent::Started {
            default_target: 32.0
        }]
    );
}

// ── ReachTarget ───────────────────────────────────────────────

#[test]
fn reach_target_reports_session() {
    let (mut app, mut sink) = make_app();
    let mut hw = MockVessel::scripted(&[10.0, 12.0, 12.0, 12.0, 12.0, 28.0, 38.0, 40.0]);

    let reply = app
        .handle_command(AppCommand::ReachTarget(40.0), &mut hw, &mut sink)
        .unwrap();

    assert!(matches!(
        reply,
        CommandReply::Session(Outcome::Settled(r)) if r.rounds == 3
    ));
    assert_eq!(app.sessions(), 1);
    assert!(sink.contains(|e| matches!(e, AppEvent::TargetReached(_))));
    assert!(!sink.contains(|e| matches!(e, AppEvent::Aborted(_))));
}

#[test]
fn sensor_fault_mid_session_closes_valves() {
    let (mut app, mut sink) = make_app();
    // fails on the reading after the first correction burst
    let mut hw = MockVessel::scripted(&[10.0, 12.0]).failing_after(5);

    let err = app
        .handle_command(AppCommand::ReachTarget(40.0), &mut hw, &mut sink)
        .unwrap_err();

    assert_eq!(err, Error::Sensor(SensorError::AdcReadFailed));
    assert_eq!(hw.close_all_calls(), 1);
    assert!(!hw.any_valve_open());
    let n = sink.events.len();
    assert_eq!(sink.events[n - 2], AppEvent::Aborted(err));
    assert_eq!(sink.events[n - 1], AppEvent::ValvesClosed);
}

#[test]
fn invalid_target_is_refused() {
    let (mut app, mut sink) = make_app();
    let mut hw = MockVessel::scripted(&[20.0]);

    let err = app
        .handle_command(AppCommand::ReachTarget(-3.0), &mut hw, &mut sink)
        .unwrap_err();

    assert_eq!(err, Error::Control(ControlError::InvalidTarget));
    assert!(hw.inflates().is_empty() && hw.deflates().is_empty());
    assert!(sink.contains(|e| *e == AppEvent::ValvesClosed));
}

// ── CloseAllValves ────────────────────────────────────────────

#[test]
fn close_all_valves_command() {
    let (mut app, mut sink) = make_app();
    let mut hw = MockVessel::scripted(&[20.0]);

    let reply = app
        .handle_command(AppCommand::CloseAllValves, &mut hw, &mut sink)
        .unwrap();

    assert_eq!(reply, CommandReply::Done);
    assert_eq!(hw.close_all_calls(), 1);
    assert_eq!(sink.events.last(), Some(&AppEvent::ValvesClosed));
}

// ── UpdateConfig + persistence ────────────────────────────────

#[test]
fn valid_config_update_is_persisted_once() {
    let (mut app, mut sink) = make_app();
    let mut hw = MockVessel::scripted(&[20.0]);
    let nvs = MockNvs::new();

    let mut cfg = SystemConfig::default();
    cfg.control.max_rounds = 5;
    cfg.default_target = 35.0;
    app.handle_command(AppCommand::UpdateConfig(cfg.clone()), &mut hw, &mut sink)
        .unwrap();

    assert!(sink.contains(|e| *e == AppEvent::ConfigUpdated));
    assert_eq!(app.compressor().max_rounds(), 5);
    assert!(app.is_config_dirty());

    assert!(app.save_if_dirty(&nvs));
    assert!(!app.save_if_dirty(&nvs));
    assert_eq!(nvs.load().unwrap(), cfg);
}

#[test]
fn invalid_config_update_is_rejected() {
    let (mut app, mut sink) = make_app();
    let mut hw = MockVessel::scripted(&[20.0]);

    let mut cfg = SystemConfig::default();
    cfg.control.error_margin = 0.0;
    let err = app
        .handle_command(AppCommand::UpdateConfig(cfg), &mut hw, &mut sink)
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(app.current_config(), SystemConfig::default());
    assert!(!app.is_config_dirty());
    assert!(!sink.contains(|e| *e == AppEvent::ConfigUpdated));
}

// ── CalibrateOutflow ──────────────────────────────────────────

#[test]
fn outflow_calibration_can_replace_the_model() {
    let (mut app, mut sink) = make_app();
    let mut hw =
        MockVessel::scripted(&[30.0, 31.0, 31.0, 31.0, 31.0, 28.0, 25.0, 21.0, 19.0]);

    let reply = app
        .handle_command(
            AppCommand::CalibrateOutflow {
                start: 30.0,
                final_pressure: 20.0,
                interval_secs: 5.0,
                apply: true,
            },
            &mut hw,
            &mut sink,
        )
        .unwrap();

    let CommandReply::Outflow(fit) = reply else {
        panic!("expected an outflow fit, got {:?}", reply);
    };
    assert_eq!(fit.samples, 4);
    assert_eq!(hw.deflates(), [5.0; 4]);
    assert_eq!(
        app.current_config().control.outflow,
        OutflowModel::Linear { m: fit.m, c: fit.c }
    );
    assert!(app.is_config_dirty());
    assert!(sink.contains(|e| *e == AppEvent::OutflowCalibrated(fit)));
}

#[test]
fn outflow_calibration_without_apply_keeps_config() {
    let (mut app, mut sink) = make_app();
    let mut hw =
        MockVessel::scripted(&[30.0, 31.0, 31.0, 31.0, 31.0, 28.0, 25.0, 21.0, 19.0]);

    app.handle_command(
        AppCommand::CalibrateOutflow {
            start: 30.0,
            final_pressure: 20.0,
            interval_secs: 5.0,
            apply: false,
        },
        &mut hw,
        &mut sink,
    )
    .unwrap();

    assert_eq!(app.current_config(), SystemConfig::default());
    assert!(!app.is_config_dirty());
}
