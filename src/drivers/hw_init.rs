//! One-shot hardware peripheral initialization.
//!
//! Configures the pressure ADC channel and the relay GPIO outputs using
//! raw ESP-IDF sys calls. Called once from `main()` before the first
//! control session.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU64, Ordering};

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

/// A relay output and the level that keeps its relay released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayLine {
    pub gpio: i32,
    pub off_high: bool,
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals(adc_channel: u32, relays: &[RelayLine]) -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_adc(adc_channel)?;
        init_relay_outputs(relays)?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(_adc_channel: u32, relays: &[RelayLine]) -> Result<(), HwInitError> {
    for line in relays {
        gpio_write(line.gpio, line.off_high);
    }
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// control-loop ADC read path.  `init_adc()` completes before the first
/// session starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc(channel: u32) -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    info!("hw_init: ADC1 configured (CH{}=pressure)", channel);
    Ok(())
}

/// One oneshot conversion; `None` when the driver reports an error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract — single-threaded control-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return None;
    }
    Some(raw.max(0) as u16)
}

// ── Relay outputs ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_relay_outputs(relays: &[RelayLine]) -> Result<(), HwInitError> {
    for line in relays {
        // Latch the off level before the pin becomes an output so the
        // relay never pulses during boot.
        unsafe { gpio_set_level(line.gpio, u32::from(line.off_high)) };
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << line.gpio,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }

    info!("hw_init: {} relay outputs configured", relays.len());
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) -> bool {
    // SAFETY: gpio_set_level writes to an already-configured output pin.
    // Also called from the panic hook; the register write is reentrant.
    (unsafe { gpio_set_level(pin, u32::from(high)) }) == ESP_OK as i32
}

#[cfg(not(target_os = "espidf"))]
static SIM_GPIO_LEVELS: AtomicU64 = AtomicU64::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) -> bool {
    if !(0..64).contains(&pin) {
        return false;
    }
    let bit = 1u64 << pin;
    if high {
        SIM_GPIO_LEVELS.fetch_or(bit, Ordering::Relaxed);
    } else {
        SIM_GPIO_LEVELS.fetch_and(!bit, Ordering::Relaxed);
    }
    true
}

/// Last level written to `pin` in simulation.
#[cfg(not(target_os = "espidf"))]
pub fn sim_gpio_level(pin: i32) -> bool {
    (0..64).contains(&pin) && SIM_GPIO_LEVELS.load(Ordering::Relaxed) & (1u64 << pin) != 0
}

// ── embedded-hal output pin ───────────────────────────────────

/// GPIO write rejected by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioWriteError(pub i32);

impl embedded_hal::digital::Error for GpioWriteError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

/// A configured output pin, addressed by GPIO number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioOutput {
    gpio: i32,
}

impl GpioOutput {
    pub const fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    pub const fn gpio(&self) -> i32 {
        self.gpio
    }
}

impl embedded_hal::digital::ErrorType for GpioOutput {
    type Error = GpioWriteError;
}

impl embedded_hal::digital::OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if gpio_write(self.gpio, false) {
            Ok(())
        } else {
            Err(GpioWriteError(self.gpio))
        }
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if gpio_write(self.gpio, true) {
            Ok(())
        } else {
            Err(GpioWriteError(self.gpio))
        }
    }
}
