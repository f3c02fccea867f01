//! nRF52840 power control - System OFF, wake source, reset cause, battery.
//!
//! nRF52840 power modes used here:
//! - System ON: normal operation (sampling, display and BLE running)
//! - System OFF: deep sleep, RAM lost, wake on GPIO DETECT (~0.4 µA)
//!
//! A wake from System OFF is a reset: the firmware restarts from `main`
//! and `RESETREAS.OFF` tells it why.

use ble_scale::battery::BatteryLevel;
use ble_scale::config::{BATTERY_DIVIDER, BATTERY_SAMPLES, BATTERY_SETTLE_MS};
use ble_scale::drivers::{PowerPlatform, ResetCause, WakeLevel};
use defmt::{debug, info};
use embassy_nrf::gpio::Output;
use embassy_nrf::pac;
use embassy_nrf::pac::gpio::vals;
use embassy_nrf::saadc::Saadc;
use embassy_time::Timer;

/// SAADC full scale in mV with gain 1/6 and the 0.6 V internal reference.
const SAADC_FULL_SCALE_MV: u32 = 3600;

/// 12-bit conversion.
const SAADC_MAX: u32 = 4096;

pub struct NrfPower {
    cause: ResetCause,
}

impl NrfPower {
    /// Latch and clear the reset reason.
    ///
    /// POWER is owned by the SoftDevice once it is enabled, so this has to
    /// run before `Softdevice::enable`.
    pub fn new() -> Self {
        let reason = pac::POWER.resetreas().read();
        let cause = if reason.off() {
            ResetCause::DeepSleepWake
        } else if reason.0 == 0 {
            ResetCause::PowerOn
        } else {
            ResetCause::Other
        };
        // Bits are sticky until written with 1.
        pac::POWER
            .resetreas()
            .write_value(pac::power::regs::Resetreas(reason.0));
        debug!("power: RESETREAS {=u32:#x}", reason.0);
        Self { cause }
    }
}

impl PowerPlatform for NrfPower {
    fn reset_cause(&self) -> ResetCause {
        self.cause
    }

    fn release_pull(&mut self, pin: u8) {
        // A GPIO wait still pending on this pin leaves SENSE set, and any
        // pin with SENSE set raises DETECT and wakes the chip.
        pac::P0.pin_cnf(usize::from(pin)).modify(|w| {
            w.set_pull(vals::Pull::DISABLED);
            w.set_sense(vals::Sense::DISABLED);
        });
    }

    fn configure_wake_source(&mut self, pin: u8, level: WakeLevel) {
        let (pull, sense) = match level {
            WakeLevel::High => (vals::Pull::PULLDOWN, vals::Sense::HIGH),
            WakeLevel::Low => (vals::Pull::PULLUP, vals::Sense::LOW),
        };
        pac::P0.pin_cnf(usize::from(pin)).write(|w| {
            w.set_dir(vals::Dir::INPUT);
            w.set_input(vals::Input::CONNECT);
            w.set_pull(pull);
            w.set_sense(sense);
        });
    }

    fn deep_sleep(&mut self) -> ! {
        info!("power: system off");
        // SAFETY: no SoftDevice call is in flight from this context; System
        // OFF does not return on success.
        unsafe {
            nrf_softdevice::raw::sd_power_system_off();
        }
        // Only reached in debug interface mode, where System OFF is emulated.
        loop {
            cortex_m::asm::wfe();
        }
    }
}

/// Measure the battery once: enable the sense divider, let it settle,
/// average a few conversions, disable it again.
pub async fn read_battery(saadc: &mut Saadc<'_, 1>, sense_enable: &mut Output<'_>) -> BatteryLevel {
    // Active low on the board's VBAT divider switch.
    sense_enable.set_low();
    Timer::after_millis(BATTERY_SETTLE_MS).await;

    let mut sum: u32 = 0;
    for _ in 0..BATTERY_SAMPLES {
        let mut buf = [0i16; 1];
        saadc.sample(&mut buf).await;
        sum += buf[0].max(0) as u32;
    }
    sense_enable.set_high();

    let raw = sum / BATTERY_SAMPLES as u32;
    let millivolts = raw * SAADC_FULL_SCALE_MV / SAADC_MAX * BATTERY_DIVIDER;
    let level = BatteryLevel::from_millivolts(millivolts);
    info!("power: battery {} mV ({}%)", millivolts, level.percent());
    level
}
