//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the command surface of the AutoCompressor: it
//! routes commands to the control loop and guarantees the valves are
//! closed whenever a command fails.  All interaction with hardware happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
