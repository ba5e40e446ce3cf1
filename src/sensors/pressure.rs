//! Analog pressure transducer driver.
//!
//! Reads the transducer through an ADC1 channel, averages a burst of
//! samples to knock down ADC noise, and maps the mean count to display
//! units with a linear [`SensorCalibration`].
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static `AtomicU16` for injection.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use log::trace;

use super::calibration::{CalibrationStats, SensorCalibration};
use crate::config::SensorConfig;
use crate::error::SensorError;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

static SIM_PRESSURE_ADC: AtomicU16 = AtomicU16::new(0);
static SIM_ADC_FAULT: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_pressure_adc(raw: u16) {
    SIM_PRESSURE_ADC.store(raw, Ordering::Relaxed);
}

/// Make every simulated ADC read fail until cleared.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc_fault(fault: bool) {
    SIM_ADC_FAULT.store(fault, Ordering::Relaxed);
}

pub struct PressureSensor {
    calibration: SensorCalibration,
    adc_channel: u32,
    samples_per_read: u16,
}

impl PressureSensor {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            calibration: SensorCalibration::from_config(config),
            adc_channel: config.adc_channel,
            samples_per_read: config.samples_per_read.max(1),
        }
    }

    pub fn set_calibration(&mut self, calibration: SensorCalibration) {
        self.calibration = calibration;
    }

    pub fn calibration(&self) -> &SensorCalibration {
        &self.calibration
    }

    pub fn units(&self) -> &str {
        self.calibration.units.as_str()
    }

    /// Calibrated pressure averaged over `samples_per_read` ADC samples.
    pub fn read(&mut self) -> Result<f64, SensorError> {
        let mut sum = 0.0;
        for _ in 0..self.samples_per_read {
            sum += self.calibration.apply(f64::from(self.read_adc()?));
        }
        let pressure = sum / f64::from(self.samples_per_read);
        trace!("Pressure sensor: {:.3} {}", pressure, self.units());
        if pressure.is_finite() {
            Ok(pressure)
        } else {
            Err(SensorError::OutOfRange)
        }
    }

    /// Raw ADC statistics for one calibration reference point.
    pub fn sample_reference(
        &mut self,
        reference: f64,
        count: usize,
    ) -> Result<CalibrationStats, SensorError> {
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            samples.push(f64::from(self.read_adc()?));
        }
        CalibrationStats::from_samples(reference, &samples).ok_or(SensorError::CalibrationFailed)
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> Result<u16, SensorError> {
        hw_init::adc1_read(self.adc_channel).ok_or(SensorError::AdcReadFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> Result<u16, SensorError> {
        let _ = self.adc_channel;
        if SIM_ADC_FAULT.load(Ordering::Relaxed) {
            return Err(SensorError::AdcReadFailed);
        }
        Ok(SIM_PRESSURE_ADC.load(Ordering::Relaxed))
    }
}
