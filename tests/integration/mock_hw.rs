//! Mock hardware adapter for integration tests.
//!
//! Replays a scripted sequence of pressure readings and records every
//! valve, delay and read call so tests can assert on the full command
//! history without touching real GPIO/ADC registers.

use autocompressor::app::events::AppEvent;
use autocompressor::app::ports::{
    ConfigError, ConfigPort, DelayPort, EventSink, PressurePort, StorageError, StoragePort, Valve,
    ValvePort,
};
use autocompressor::config::SystemConfig;
use autocompressor::error::{RelayError, SensorError};
use std::cell::RefCell;
use std::collections::HashMap;

// ── Hardware call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    SetValve { valve: Valve, open: bool },
    Sleep(f64),
    Read(f64),
    CloseAll,
}

// ── MockVessel ────────────────────────────────────────────────

pub struct MockVessel {
    readings: Vec<f64>,
    next: usize,
    /// Reads at or beyond this index fail with `AdcReadFailed`.
    fail_from: Option<usize>,
    inlet: bool,
    outlet: bool,
    pub calls: Vec<HwCall>,
}

#[allow(dead_code)]
impl MockVessel {
    /// Readings are returned in order; the last one repeats forever.
    pub fn scripted(readings: &[f64]) -> Self {
        Self {
            readings: readings.to_vec(),
            next: 0,
            fail_from: None,
            inlet: false,
            outlet: false,
            calls: Vec::new(),
        }
    }

    pub fn failing_after(mut self, reads: usize) -> Self {
        self.fail_from = Some(reads);
        self
    }

    /// Durations the inlet was held open, in order.
    pub fn inflates(&self) -> Vec<f64> {
        self.bursts(Valve::Inlet)
    }

    /// Durations the outlet was held open, in order.
    pub fn deflates(&self) -> Vec<f64> {
        self.bursts(Valve::Outlet)
    }

    pub fn any_valve_open(&self) -> bool {
        self.inlet || self.outlet
    }

    pub fn close_all_calls(&self) -> usize {
        self.calls.iter().filter(|c| **c == HwCall::CloseAll).count()
    }

    fn bursts(&self, valve: Valve) -> Vec<f64> {
        let mut open = None;
        let mut out = Vec::new();
        for call in &self.calls {
            match *call {
                HwCall::SetValve { valve: v, open: o } if v == valve => {
                    open = o.then_some(());
                }
                HwCall::Sleep(secs) if open.is_some() => out.push(secs),
                HwCall::CloseAll => open = None,
                _ => {}
            }
        }
        out
    }
}

impl PressurePort for MockVessel {
    fn read_pressure(&mut self) -> Result<f64, SensorError> {
        let idx = self.next;
        self.next += 1;
        if self.fail_from.is_some_and(|n| idx >= n) {
            return Err(SensorError::AdcReadFailed);
        }
        let value = self.readings[idx.min(self.readings.len() - 1)];
        self.calls.push(HwCall::Read(value));
        Ok(value)
    }

    fn units(&self) -> &str {
        "PSI"
    }
}

impl ValvePort for MockVessel {
    fn set_valve(&mut self, valve: Valve, open: bool) -> Result<(), RelayError> {
        match valve {
            Valve::Inlet => self.inlet = open,
            Valve::Outlet => self.outlet = open,
        }
        self.calls.push(HwCall::SetValve { valve, open });
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
        self.calls.push(HwCall::CloseAll);
    }
}

impl DelayPort for MockVessel {
    fn sleep_secs(&mut self, secs: f64) {
        self.calls.push(HwCall::Sleep(secs));
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    config: RefCell<Option<SystemConfig>>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved_config(&self) -> Option<SystemConfig> {
        self.config.borrow().clone()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = format!("{}::{}", namespace, key);
        match self.store.get(&k) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(self.saved_config().unwrap_or_default())
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.config.borrow_mut() = Some(config.clone());
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, pred: impl Fn(&AppEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
