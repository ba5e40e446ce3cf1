//! Unified error types for the AutoCompressor firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! service layer can abort a session and drive the valves to their safe
//! state through one code path.  All variants are `Copy` so they can be
//! carried inside events without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// The pressure sensor could not be read or calibrated.
    Sensor(SensorError),
    /// A relay channel could not be registered or driven.
    Relay(RelayError),
    /// The control loop aborted.
    Control(ControlError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Relay(e) => write!(f, "relay: {e}"),
            Self::Control(e) => write!(f, "control: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// Not enough distinct reference points to fit a calibration line.
    CalibrationFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::CalibrationFailed => write!(f, "calibration fit failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Relay errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// No channel is registered under the requested name.
    UnknownChannel,
    /// The bank already holds its configured maximum number of channels.
    ChannelCapacityExceeded,
    /// A channel with the same name is already registered.
    DuplicateChannel,
    /// Channel name does not fit the fixed-size name buffer.
    NameTooLong,
    /// GPIO write failed.
    GpioWriteFailed,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownChannel => write!(f, "unknown relay channel"),
            Self::ChannelCapacityExceeded => write!(f, "relay channel capacity exceeded"),
            Self::DuplicateChannel => write!(f, "relay channel already registered"),
            Self::NameTooLong => write!(f, "relay channel name too long"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<RelayError> for Error {
    fn from(e: RelayError) -> Self {
        Self::Relay(e)
    }
}

// ---------------------------------------------------------------------------
// Estimation faults
// ---------------------------------------------------------------------------

/// Why an ideal-gas estimate could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateFault {
    /// Two pressure readings that must differ were equal.
    ZeroPressureDelta,
    /// A flow rate of zero mol/s was supplied.
    ZeroFlowRate,
    /// A pressure of zero Pa was used as a divisor.
    ZeroPressure,
    /// The computation produced `NaN` or an infinity.
    NonFinite,
    /// The estimated molar quantity or volume was not positive.
    NonPositive,
}

impl fmt::Display for EstimateFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroPressureDelta => write!(f, "no pressure change between readings"),
            Self::ZeroFlowRate => write!(f, "flow rate is zero"),
            Self::ZeroPressure => write!(f, "pressure is zero"),
            Self::NonFinite => write!(f, "result is not finite"),
            Self::NonPositive => write!(f, "result is not positive"),
        }
    }
}

// ---------------------------------------------------------------------------
// Control errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlError {
    /// Target pressure missing, non-finite or non-positive.
    InvalidTarget,
    /// The gas state could not be estimated.
    EstimationFailed(EstimateFault),
    /// The round or time budget ran out before the target was reached.
    NonConvergence { rounds: u32, elapsed_secs: f64 },
    /// A valve burst with a negative or non-finite duration was requested.
    InvalidDuration,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTarget => write!(f, "target not given or invalid"),
            Self::EstimationFailed(e) => write!(f, "estimation failed: {e}"),
            Self::NonConvergence {
                rounds,
                elapsed_secs,
            } => write!(
                f,
                "target not reached after {rounds} rounds ({elapsed_secs:.1}s)"
            ),
            Self::InvalidDuration => write!(f, "invalid valve duration"),
        }
    }
}

impl From<ControlError> for Error {
    fn from(e: ControlError) -> Self {
        Self::Control(e)
    }
}

impl From<EstimateFault> for ControlError {
    fn from(e: EstimateFault) -> Self {
        Self::EstimationFailed(e)
    }
}

impl From<EstimateFault> for Error {
    fn from(e: EstimateFault) -> Self {
        Self::Control(ControlError::EstimationFailed(e))
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
