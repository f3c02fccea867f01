//! Collaborator contracts consumed by the core.
//!
//! The core never talks to hardware directly. The firmware implements
//! these traits on top of Embassy/SoftDevice peripherals (`hx711`,
//! `ble`, `ui::display`, `power`); host tests implement them with mocks.

use crate::error::Result;

/// Load-cell amplifier (HX711 on the real board).
///
/// Raw ADC counts in, calibrated grams out via `(raw - offset) / scale`.
pub trait LoadCell {
    /// Set the counts-per-gram factor used by [`LoadCell::read_calibrated`].
    fn set_scale(&mut self, factor: f32);

    /// Average `samples` raw readings and store the result as the zero offset.
    ///
    /// Must not block. A front-end that cannot have the samples at hand
    /// may collect them from the following reads, which then fail with
    /// `SensorFault::Settling` until the new offset is in place.
    fn tare(&mut self, samples: u8) -> Result<()>;

    /// Average of `times` raw readings, no offset or scale applied.
    fn read_raw(&mut self, times: u8) -> Result<i32>;

    /// Average of `times` readings converted to grams.
    fn read_calibrated(&mut self, times: u8) -> Result<f32>;

    /// Put the front-end into its power-down state.
    fn power_down(&mut self) -> Result<()>;
}

/// Bluetooth weight-reporting service.
///
/// Both calls are fire-and-forget: they update the GATT value and, when
/// asked to, queue a notification without waiting for delivery.
pub trait WeightService {
    fn set_battery_level(&mut self, percent: u8);
    fn set_weight(&mut self, value: f32, notify: bool);
}

/// Glyphs the display loop composes a frame from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Glyph {
    /// Decimal digit 0..=9.
    Digit(u8),
    Minus,
    Dot,
    /// Unit marker ("g").
    Gram,
    /// Low-battery warning.
    Battery,
    /// Boot splash.
    Logo,
}

/// Frame-buffered monochrome display.
pub trait WeightDisplay {
    /// Blank the frame buffer.
    fn clear(&mut self);

    /// Draw `glyph` with its top-left corner at `(x, y)`.
    fn draw_glyph(&mut self, glyph: Glyph, x: i32, y: i32);

    /// Push the frame buffer to the panel.
    fn present(&mut self) -> Result<()>;

    /// Switch the panel off. Later frames are not shown.
    fn power_off(&mut self) -> Result<()>;
}

/// Level that wakes the chip from deep sleep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeLevel {
    High,
    Low,
}

/// Why the chip started running this time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetCause {
    /// Cold boot or brown-out.
    PowerOn,
    /// Woken from deep sleep by the wake source.
    DeepSleepWake,
    /// Reset pin, watchdog, soft reset, lockup...
    Other,
}

/// Chip-level power control.
pub trait PowerPlatform {
    fn reset_cause(&self) -> ResetCause;

    /// Disconnect any pull resistor and edge sensing from `pin`, so it
    /// neither leaks nor wakes the chip while asleep.
    fn release_pull(&mut self, pin: u8);

    /// Make `pin` reaching `level` wake the chip from deep sleep.
    fn configure_wake_source(&mut self, pin: u8, level: WakeLevel);

    /// Enter deep sleep. Volatile state is lost; wake restarts from reset.
    fn deep_sleep(&mut self) -> !;
}
