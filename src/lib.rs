//! Hardware-independent core of the ble-scale firmware.
//!
//! Everything here is `no_std`, allocation-free and generic over the
//! collaborator traits in [`drivers`], so it runs both on the nRF52840
//! (linked into `main.rs`) and on the host for unit tests.
//!
//! Usage: `cargo test` (host) - no embedded hardware required.
//!
//! Note: The embedded binary (`main.rs`, feature `embedded`) is `#![no_std]`
//! and `#![no_main]` and only adds the peripheral drivers and tasks.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Core Modules
// ═══════════════════════════════════════════════════════════════════════════

pub mod app;
pub mod battery;
pub mod calibration;
pub mod config;
pub mod debounce;
pub mod drivers;
pub mod error;
pub mod estimator;
pub mod power_logic;
pub mod sampling;
pub mod weight;

// ═══════════════════════════════════════════════════════════════════════════
// UI Re-exports
// ═══════════════════════════════════════════════════════════════════════════

// `ui/mod.rs` belongs to the firmware (display driver, button tasks); only
// the pure frame layout is part of the library.
#[path = "ui/layout.rs"]
mod ui_layout_impl;

pub mod ui {
    pub mod layout {
        pub use crate::ui_layout_impl::{render_logo, render_weight};
    }
}

pub use app::{ScaleApp, Step};
pub use error::{Error, Result};
