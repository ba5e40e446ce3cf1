//! Named relay bank.
//!
//! Each channel is a GPIO output driving one relay coil.  Relay boards
//! differ in which logic level de-energises the coil, so the level that
//! means "off" is given once at registration and resolved to a
//! [`Polarity`]; `set` never re-derives it.
//!
//! Registering a channel drives it to its off level immediately, so a
//! freshly wired valve is closed before anything can command it.
//!
//! ## Dual-target design
//!
//! The bank is generic over [`embedded_hal::digital::OutputPin`].  On the
//! device the pins are [`GpioOutput`](super::hw_init::GpioOutput)s; host
//! tests plug in recording pins.

use embedded_hal::digital::OutputPin;
use heapless::{String, Vec};
use log::{debug, warn};

use crate::error::RelayError;

/// Compile-time upper bound on channels in one bank.
pub const MAX_RELAY_CHANNELS: usize = 8;
pub const MAX_CHANNEL_NAME: usize = 16;

/// Which logic level energises the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Coil energised by a low output; idles high.
    ActiveLow,
    /// Coil energised by a high output; idles low.
    ActiveHigh,
}

impl Polarity {
    /// Resolve from the level that turns the relay off.
    pub const fn from_off_level(off_high: bool) -> Self {
        if off_high {
            Self::ActiveLow
        } else {
            Self::ActiveHigh
        }
    }

    /// Output level for the requested relay state.
    pub const fn level(self, on: bool) -> bool {
        match self {
            Self::ActiveLow => !on,
            Self::ActiveHigh => on,
        }
    }
}

struct Channel<P> {
    name: String<MAX_CHANNEL_NAME>,
    pin: P,
    polarity: Polarity,
    on: bool,
}

impl<P: OutputPin> Channel<P> {
    fn drive(&mut self, on: bool) -> Result<(), RelayError> {
        let result = if self.polarity.level(on) {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|_| {
            warn!("Relay '{}': GPIO write failed", self.name);
            RelayError::GpioWriteFailed
        })?;
        self.on = on;
        Ok(())
    }
}

pub struct RelayBank<P: OutputPin> {
    channels: Vec<Channel<P>, MAX_RELAY_CHANNELS>,
    max_channels: usize,
}

impl<P: OutputPin> RelayBank<P> {
    /// `max_channels` is clamped to [`MAX_RELAY_CHANNELS`].
    pub fn new(max_channels: usize) -> Self {
        Self {
            channels: Vec::new(),
            max_channels: max_channels.min(MAX_RELAY_CHANNELS),
        }
    }

    pub fn max_channels(&self) -> usize {
        self.max_channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Add a channel and drive it off.
    pub fn register(&mut self, name: &str, pin: P, off_high: bool) -> Result<(), RelayError> {
        if self.has_channel(name) {
            return Err(RelayError::DuplicateChannel);
        }
        if self.channels.len() >= self.max_channels {
            return Err(RelayError::ChannelCapacityExceeded);
        }
        let mut label = String::new();
        label.push_str(name).map_err(|_| RelayError::NameTooLong)?;

        let mut channel = Channel {
            name: label,
            pin,
            polarity: Polarity::from_off_level(off_high),
            on: false,
        };
        channel.drive(false)?;
        debug!("Relay '{}' registered ({:?})", name, channel.polarity);
        self.channels
            .push(channel)
            .map_err(|_| RelayError::ChannelCapacityExceeded)
    }

    /// Energise (`true`) or release (`false`) a channel.
    pub fn set(&mut self, name: &str, on: bool) -> Result<(), RelayError> {
        let idx = self.position(name).ok_or(RelayError::UnknownChannel)?;
        self.channels[idx].drive(on)
    }

    pub fn get_state(&self, name: &str) -> Result<bool, RelayError> {
        self.position(name)
            .map(|idx| self.channels[idx].on)
            .ok_or(RelayError::UnknownChannel)
    }

    /// Release every channel.  Keeps going past a failed write and
    /// reports the first failure.
    pub fn all_off(&mut self) -> Result<(), RelayError> {
        let mut first_err = None;
        for channel in self.channels.iter_mut() {
            if let Err(e) = channel.drive(false) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Release a channel and hand its pin back.
    pub fn remove(&mut self, name: &str) -> Result<P, RelayError> {
        let idx = self.position(name).ok_or(RelayError::UnknownChannel)?;
        self.channels[idx].drive(false)?;
        Ok(self.channels.swap_remove(idx).pin)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name.as_str() == name)
    }
}
