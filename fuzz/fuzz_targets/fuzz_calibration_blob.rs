//! Fuzz target: stored sensor calibration
//!
//! Plants arbitrary bytes where the calibration blob lives and verifies:
//! - `SensorCalibration::load` never panics on a corrupt blob
//! - A blob that loads survives a save/load cycle unchanged
//!
//! cargo fuzz run fuzz_calibration_blob

#![no_main]

use autocompressor::app::ports::{StorageError, StoragePort};
use autocompressor::sensors::SensorCalibration;
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

// ── In-memory StoragePort for fuzz testing ────────────────────

struct MemStore {
    data: HashMap<String, Vec<u8>>,
}

impl MemStore {
    fn new() -> Self {
        Self { data: HashMap::new() }
    }
}

impl StoragePort for MemStore {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.data.get(&format!("{ns}::{key}")) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.data.insert(format!("{ns}::{key}"), data.to_vec());
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.data.contains_key(&format!("{ns}::{key}"))
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.data.remove(&format!("{ns}::{key}"));
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let mut store = MemStore::new();
    let _ = store.write("sensor", "calib", data);

    let Ok(cal) = SensorCalibration::load(&store) else {
        return;
    };
    // NaN coefficients never compare equal; nothing more to check.
    if !(cal.m.is_finite() && cal.c.is_finite()) {
        return;
    }

    cal.save(&mut store).expect("in-memory save cannot fail");
    let reloaded = SensorCalibration::load(&store).expect("saved blob must load");
    assert_eq!(reloaded, cal);
});
