//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and filter
//! constants live here so they can be tuned in one place.

// GPIO pin assignments (nRF52840, P0 port)
//
// These are logical numbers; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   Reset (tare) button  → P0.15   short press tares, also the wake source
//   Sleep button         → P0.27   hold 1 s to enter deep sleep
//   HX711 DOUT           → P0.03
//   HX711 PD_SCK         → P0.02
//   I²C SDA              → P0.04
//   I²C SCL              → P0.05
//   Battery sense switch → P0.14
//   Battery sense input  → P0.31 (AIN7)

/// Reset (tare) button pin number, active-high with pull-down.
pub const RESET_BUTTON_PIN: u8 = 15;

/// Sleep button pin number, active-high with pull-down.
pub const SLEEP_BUTTON_PIN: u8 = 27;

// Buttons

/// Debounce window for the reset (tare) button (ms).
pub const RESET_DEBOUNCE_MS: u32 = 50;

/// Debounce window for the sleep button (ms). Doubles as the "hold to sleep" time.
pub const SLEEP_DEBOUNCE_MS: u32 = 1000;

/// Capacity of the deferred dispatch queue shared by both switches.
pub const DISPATCH_QUEUE_DEPTH: usize = 4;

// Sampling

/// Minimum spacing between BLE weight notifications (ms).
pub const NOTIFY_INTERVAL_MS: u64 = 100;

/// Fixed yield between sampling loop iterations (ms).
pub const SAMPLE_YIELD_MS: u64 = 1;

/// How long the sampling loop waits for the HX711 to signal data-ready (ms).
/// 10 SPS mode needs ~100 ms per conversion.
pub const SENSOR_READY_TIMEOUT_MS: u64 = 250;

/// Samples averaged per tick by the sampling loop.
pub const SAMPLES_PER_TICK: u8 = 1;

/// Samples averaged when the reset button tares the scale.
pub const TARE_SAMPLES: u8 = 3;

/// Samples averaged for the boot-time tare.
pub const BOOT_TARE_SAMPLES: u8 = 10;

/// Quantisation step for reported and displayed weight (grams).
pub const WEIGHT_STEP: f32 = 0.05;

// Estimator

/// Kalman process noise `q` (how fast the true weight may drift between samples).
pub const KALMAN_PROCESS_NOISE: f32 = 0.1;

/// Kalman measurement noise `r` (variance of one calibrated HX711 sample).
pub const KALMAN_MEASUREMENT_NOISE: f32 = 0.03;

/// Kalman covariance used at start-up and after every tare.
pub const KALMAN_INITIAL_COVARIANCE: f32 = 1.0;

// Load cell

/// HX711 extra clock pulses selecting channel A, gain 64.
pub const HX711_GAIN_PULSES: u8 = 3;

/// Raw counts per gram used until calibration mode stores a better value.
pub const DEFAULT_SCALE_FACTOR: f32 = 1959.57;

/// Raw samples averaged per reading in calibration mode.
pub const CALIBRATION_SAMPLES: u8 = 100;

/// Reference mass placed on the pan to finish calibration (grams).
pub const CALIBRATION_REFERENCE_GRAMS: f32 = 100.0;

// Display (SSD1306 128×32)

/// Delay between display frames (ms). Rendering cost dominates the frame rate.
pub const DISPLAY_YIELD_MS: u64 = 1;

/// Right edge the weight text is aligned against.
pub const TEXT_RIGHT_EDGE: i32 = 118;

/// Width of a digit or minus glyph.
pub const DIGIT_WIDTH: i32 = 22;

/// Width of the decimal point glyph.
pub const DOT_WIDTH: i32 = 7;

/// Top row of digit glyphs.
pub const DIGIT_Y: i32 = 1;

/// Top row of the decimal point glyph.
pub const DOT_Y: i32 = 27;

/// Position of the unit ("g") glyph.
pub const UNIT_POS: (i32, i32) = (117, 16);

/// Position of the low-battery glyph.
pub const BATTERY_POS: (i32, i32) = (117, 1);

/// Position of the boot logo.
pub const LOGO_POS: (i32, i32) = (51, 1);

/// Longest weight text shown with two decimals before falling back to one.
pub const MAX_TEXT_LEN: usize = 6;

// Battery

/// Battery percentage at or below which the low-battery glyph is shown.
pub const BATTERY_LOW_PERCENT: u8 = 20;

/// Cell voltage mapped to 0 %.
pub const BATTERY_EMPTY_MV: u32 = 3300;

/// Cell voltage mapped to 100 %.
pub const BATTERY_FULL_MV: u32 = 4200;

/// ADC samples averaged for the boot-time battery reading.
pub const BATTERY_SAMPLES: usize = 10;

/// Settling time after enabling the battery sense switch (ms).
pub const BATTERY_SETTLE_MS: u64 = 10;

/// Resistor divider ratio between the cell and the ADC pin.
pub const BATTERY_DIVIDER: u32 = 2;

// BLE

/// GAP device name advertised by the scale.
pub const BLE_DEVICE_NAME: &str = "BLE-Scale";

// Calibration storage

/// Flash page index where calibration storage starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 252;

/// Number of flash pages reserved for calibration storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;
