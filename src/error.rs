//! Unified error type for ble-scale.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.
//!
//! Nothing here is ever shown to the user: every failure degrades to
//! "skip this tick" (sampling, display) or "carry on" (power-down).

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Load cell
    /// The load cell did not deliver a usable sample this tick.
    Sensor(SensorFault),

    // Power
    /// A peripheral did not power down cleanly before deep sleep.
    PowerDown(Peripheral),

    // Buttons
    /// The deferred dispatch queue was full; the press was dropped.
    QueueFull,

    // UI / Display
    /// I²C transaction to the display failed.
    Display,

    // BLE
    /// The SoftDevice rejected a GATT operation.
    Ble,

    // Storage
    /// Flash read/write failed or held an invalid record.
    Storage,
}

/// Ways a load-cell read can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorFault {
    /// The converter did not signal data-ready in time.
    Timeout,
    /// A tare is still collecting conversions; readings resume after it.
    Settling,
    /// The converted value was NaN or infinite (e.g. scale factor of zero).
    NotFinite,
}

/// Peripherals that are powered down on the way into deep sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    Display,
    LoadCell,
}

/// Convenience alias used by the collaborator traits.
pub type Result<T> = core::result::Result<T, Error>;

// Convenience conversions

impl From<SensorFault> for Error {
    fn from(e: SensorFault) -> Self {
        Error::Sensor(e)
    }
}
