//! Battery charge as a percentage, measured once per boot.

use crate::config::{BATTERY_EMPTY_MV, BATTERY_FULL_MV, BATTERY_LOW_PERCENT};

/// Charge level in `0..=100` percent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryLevel(u8);

impl BatteryLevel {
    pub const FULL: Self = Self(100);

    /// Clamp `percent` into range.
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }

    /// Linear mapping of cell voltage between the empty and full points.
    ///
    /// This is a coarse approximation; Li-ion discharge is far from linear.
    pub fn from_millivolts(mv: u32) -> Self {
        if mv <= BATTERY_EMPTY_MV {
            return Self(0);
        }
        if mv >= BATTERY_FULL_MV {
            return Self::FULL;
        }
        let span = BATTERY_FULL_MV - BATTERY_EMPTY_MV;
        Self(((mv - BATTERY_EMPTY_MV) * 100 / span) as u8)
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Whether the display should show the low-battery glyph.
    pub fn is_low(self) -> bool {
        self.0 <= BATTERY_LOW_PERCENT
    }
}
