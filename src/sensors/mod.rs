//! Sensor subsystem — the vessel pressure transducer and its calibration.

pub mod calibration;
pub mod pressure;

pub use calibration::{CalibrationStats, SensorCalibration};
pub use pressure::PressureSensor;
