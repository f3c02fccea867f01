//! User interface subsystem - OLED display + physical buttons.
//!
//! ## Components
//!
//! - **Display**: SSD1306 128×32 OLED via I²C, redrawn continuously from
//!   the shared weight
//! - **Buttons**: 2 tactile switches (RESET, SLEEP) with debouncing

pub mod buttons;
pub mod display;

use ble_scale::battery::BatteryLevel;
use ble_scale::config::DISPLAY_YIELD_MS;
use ble_scale::ui::layout::render_weight;
use ble_scale::weight::SharedWeight;
use defmt::{info, warn};
use embassy_time::Timer;

use display::OledHandle;

/// Display loop: redraw the latest filtered weight, yield, repeat.
///
/// Frames are not rate limited. A failed frame is logged once per run of
/// failures and retried on the next iteration.
#[embassy_executor::task]
pub async fn display_task(
    mut display: OledHandle,
    weight: &'static SharedWeight,
    battery: BatteryLevel,
) -> ! {
    let mut failing = false;
    loop {
        if display.is_powered() {
            match render_weight(&mut display, weight.load(), battery) {
                Ok(()) if failing => {
                    info!("display: recovered");
                    failing = false;
                }
                Ok(()) => {}
                Err(e) if !failing => {
                    warn!("display: frame failed: {:?}", e);
                    failing = true;
                }
                Err(_) => {}
            }
        }
        Timer::after_millis(DISPLAY_YIELD_MS).await;
    }
}
