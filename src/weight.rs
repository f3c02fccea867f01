//! The current weight as seen by the display and BLE paths.

use core::fmt::Write;
use core::sync::atomic::{AtomicU32, Ordering};

use heapless::String;

use crate::config::{MAX_TEXT_LEN, WEIGHT_STEP};

/// Latest filtered weight, shared between tasks without a lock.
///
/// The `f32` is stored as its bit pattern in an `AtomicU32`, so a reader
/// always sees a complete value from some store. The sampling loop is the
/// only writer; `store` uses `Release` and `load` uses `Acquire`, which is
/// enough because nothing else is published through this cell.
pub struct SharedWeight(AtomicU32);

impl SharedWeight {
    pub const fn new() -> Self {
        // 0x0000_0000 is +0.0
        Self(AtomicU32::new(0))
    }

    pub fn store(&self, grams: f32) {
        self.0.store(grams.to_bits(), Ordering::Release);
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }
}

impl Default for SharedWeight {
    fn default() -> Self {
        Self::new()
    }
}

/// Round to the nearest 0.05 g step.
pub fn quantize(grams: f32) -> f32 {
    libm::roundf(grams / WEIGHT_STEP) * WEIGHT_STEP
}

/// Text shown on the display for `grams`.
///
/// Two decimals, or one if that would not fit; negative zero is shown
/// without its sign.
pub fn format_weight(grams: f32) -> String<16> {
    let rounded = quantize(grams);
    let mut text: String<16> = String::new();
    if write!(text, "{:.2}", rounded).is_err() || text.len() > MAX_TEXT_LEN {
        text.clear();
        // Worst case for a finite f32 does not fit 16 chars either; leave
        // whatever fitted and let the layout clip it.
        let _ = write!(text, "{:.1}", rounded);
    }
    if matches!(text.as_str(), "-0.00" | "-0.0") {
        let mut unsigned: String<16> = String::new();
        let _ = unsigned.push_str(&text[1..]);
        return unsigned;
    }
    text
}

/// Value carried by the BLE weight characteristic: hundredths of a gram.
pub fn ble_encode(grams: f32) -> i32 {
    let centi = libm::roundf(grams * 100.0);
    if centi.is_nan() {
        0
    } else {
        // `as` saturates at the i32 range.
        centi as i32
    }
}
