//! Relay fail-safe.
//!
//! An inlet valve left open keeps pumping air into the vessel.  Every
//! relay output is therefore recorded here with the level that releases
//! it, and [`force_all_off`] drives all of them to that level directly
//! through GPIO, bypassing the relay bank.  It is safe to call from the
//! panic hook: the registry is a fixed table of atomics, so no lock or
//! allocation is involved.
//!
//! The normal abort path (`AppService` closing valves after an error) goes
//! through the relay bank; this module covers the paths where the bank is
//! unreachable.

use core::sync::atomic::{AtomicI32, AtomicU8, Ordering};

use log::{error, warn};

use crate::drivers::hw_init;
use crate::drivers::relay::MAX_RELAY_CHANNELS;

const EMPTY_SLOT: i32 = -1;

static RELAY_GPIOS: [AtomicI32; MAX_RELAY_CHANNELS] =
    [const { AtomicI32::new(EMPTY_SLOT) }; MAX_RELAY_CHANNELS];
/// Bit `i` set: slot `i` is released by driving it high.
static OFF_HIGH_MASK: AtomicU8 = AtomicU8::new(0);

/// Record a relay output and its off level.  Re-registering a GPIO
/// updates its level.  Returns `false` when the table is full.
pub fn register_relay(gpio: i32, off_high: bool) -> bool {
    let slot = RELAY_GPIOS
        .iter()
        .position(|g| g.load(Ordering::Acquire) == gpio)
        .or_else(|| {
            RELAY_GPIOS.iter().position(|g| {
                g.compare_exchange(EMPTY_SLOT, gpio, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            })
        });

    let Some(slot) = slot else {
        warn!("Fail-safe registry full, GPIO {} not recorded", gpio);
        return false;
    };
    let bit = 1u8 << slot;
    if off_high {
        OFF_HIGH_MASK.fetch_or(bit, Ordering::AcqRel);
    } else {
        OFF_HIGH_MASK.fetch_and(!bit, Ordering::AcqRel);
    }
    true
}

/// Number of relay outputs currently recorded.
pub fn registered_relays() -> usize {
    RELAY_GPIOS
        .iter()
        .filter(|g| g.load(Ordering::Acquire) != EMPTY_SLOT)
        .count()
}

/// Drive every recorded relay to its off level.  Returns how many
/// writes succeeded.
pub fn force_all_off() -> usize {
    let mask = OFF_HIGH_MASK.load(Ordering::Acquire);
    let mut released = 0;
    for (slot, gpio) in RELAY_GPIOS.iter().enumerate() {
        let gpio = gpio.load(Ordering::Acquire);
        if gpio == EMPTY_SLOT {
            continue;
        }
        if hw_init::gpio_write(gpio, mask & (1u8 << slot) != 0) {
            released += 1;
        }
    }
    released
}

/// Install a panic hook that releases every recorded relay, then defers
/// to the previously installed hook.
pub fn install_failsafe_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let released = force_all_off();
        error!("PANIC: {} relay(s) forced off", released);
        previous(info);
    }));
}
