//! Pressure control — ideal gas physics and the valve-burst control loop.
//!
//! Everything here is pure logic over the port traits in
//! [`crate::app::ports`] and builds on the host.

pub mod actuator;
pub mod compressor;
pub mod estimator;
pub mod flow;
pub mod outflow_calibration;
pub mod physics;
pub mod reader;


pub use actuator::{Direction, ValveActuator};
pub use compressor::{AutoCompressor, GasState, Outcome, Phase, SessionReport};
pub use flow::{FlowRates, OutflowModel};
pub use outflow_calibration::OutflowFit;
