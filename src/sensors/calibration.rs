//! Linear sensor calibration.
//!
//! The transducer's output is linear in pressure over its working range,
//! so a calibration is a line `pressure = m * raw + c`.  Calibration data
//! is gathered by holding the vessel at known reference pressures,
//! averaging a burst of raw samples at each ([`CalibrationStats`]), and
//! fitting the line through the averages ([`fit_linear`]).
//!
//! The fitted line is persisted as a postcard blob through
//! [`StoragePort`] so it survives reboots independently of the rest of the
//! system configuration.

use heapless::String;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::SensorConfig;
use crate::error::SensorError;

pub(crate) const CALIBRATION_NAMESPACE: &str = "sensor";
pub(crate) const CALIBRATION_KEY: &str = "calib";
const MAX_CALIBRATION_BLOB: usize = 64;

/// `pressure = m * raw + c`, in `units`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorCalibration {
    pub m: f64,
    pub c: f64,
    pub units: String<8>,
}

impl SensorCalibration {
    pub fn from_config(config: &SensorConfig) -> Self {
        Self {
            m: config.m,
            c: config.c,
            units: config.units.clone(),
        }
    }

    pub fn apply(&self, raw: f64) -> f64 {
        self.m * raw + self.c
    }

    /// The control loop works in PSI; a line in any other unit, or one
    /// that is flat or non-finite, cannot drive it.
    pub fn is_usable(&self) -> bool {
        self.units.eq_ignore_ascii_case("psi")
            && self.m.is_finite()
            && self.m != 0.0
            && self.c.is_finite()
    }

    /// Persist to `storage` under the sensor namespace.
    pub fn save(&self, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(self).map_err(|_| StorageError::IoError)?;
        storage.write(CALIBRATION_NAMESPACE, CALIBRATION_KEY, &bytes)?;
        info!(
            "Saved sensor calibration y = {}x + {} ({})",
            self.m, self.c, self.units
        );
        Ok(())
    }

    /// Load a previously saved calibration.
    ///
    /// A missing entry is [`StorageError::NotFound`].  An undecodable blob,
    /// or one that fails [`Self::is_usable`], is [`StorageError::IoError`].
    pub fn load(storage: &impl StoragePort) -> Result<Self, StorageError> {
        let mut buf = [0u8; MAX_CALIBRATION_BLOB];
        let len = storage.read(CALIBRATION_NAMESPACE, CALIBRATION_KEY, &mut buf)?;
        let cal: Self = postcard::from_bytes(&buf[..len]).map_err(|_| {
            warn!("Stored sensor calibration is corrupt");
            StorageError::IoError
        })?;
        if !cal.is_usable() {
            warn!(
                "Ignoring stored calibration y = {}x + {} ({}): not a PSI line",
                cal.m, cal.c, cal.units
            );
            return Err(StorageError::IoError);
        }
        info!(
            "Loaded previous calibration data of y = {}x + {} ({})",
            cal.m, cal.c, cal.units
        );
        Ok(cal)
    }
}

/// Summary of repeated raw samples at one reference pressure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationStats {
    pub reference: f64,
    pub samples: usize,
    pub average: f64,
    pub variance: f64,
    pub std_dev: f64,
}

impl CalibrationStats {
    /// Population statistics of `samples`; `None` when empty.
    pub fn from_samples(reference: f64, samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let average = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - average).powi(2)).sum::<f64>() / n;
        Some(Self {
            reference,
            samples: samples.len(),
            average,
            variance,
            std_dev: variance.sqrt(),
        })
    }
}

/// Straight line from [`fit_linear`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub m: f64,
    pub c: f64,
}

/// Ordinary least squares through `(x, y)` points.
pub fn fit_linear(points: &[(f64, f64)]) -> Result<LinearFit, SensorError> {
    if points.len() < 2 {
        return Err(SensorError::CalibrationFailed);
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for &(x, y) in points {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }
    if sxx == 0.0 || !sxx.is_finite() {
        return Err(SensorError::CalibrationFailed);
    }

    let m = sxy / sxx;
    let c = mean_y - m * mean_x;
    if !m.is_finite() || !c.is_finite() {
        return Err(SensorError::CalibrationFailed);
    }
    Ok(LinearFit { m, c })
}

/// Fit a [`SensorCalibration`] from per-reference statistics.
pub fn calibrate(
    stats: &[CalibrationStats],
    units: &str,
) -> Result<SensorCalibration, SensorError> {
    let points: Vec<(f64, f64)> = stats.iter().map(|s| (s.average, s.reference)).collect();
    let line = fit_linear(&points)?;
    let mut label = String::new();
    label
        .push_str(units)
        .map_err(|_| SensorError::CalibrationFailed)?;
    info!("Calculated m_x = {}, c = {}", line.m, line.c);
    Ok(SensorCalibration {
        m: line.m,
        c: line.c,
        units: label,
    })
}
