//! GPIO / peripheral pin assignments for the AutoCompressor controller board.
//!
//! Config defaults reference these instead of hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Relay board (2-channel, opto-isolated)
// ---------------------------------------------------------------------------

/// Digital output: relay IN1, switches the compressor inlet solenoid.
pub const INLET_RELAY_GPIO: i32 = 5;
/// Digital output: relay IN2, switches the vent outlet solenoid.
pub const OUTLET_RELAY_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// Sensors — Analog (ADC1)
// ---------------------------------------------------------------------------

/// ADC1 channel 3 (GPIO4): ratiometric pressure transducer via divider.
pub const PRESSURE_ADC_CHANNEL: u32 = 3;
