//! SSD1306 OLED display wrapper.
//!
//! Glyphs are drawn with embedded-graphics primitives: digits and the
//! minus sign as seven-segment figures filling a 22×30 cell, the unit and
//! logo as text.

use core::cell::RefCell;

use ble_scale::drivers::{Glyph, WeightDisplay};
use ble_scale::error::{Error, Peripheral, Result};
use embassy_nrf::peripherals::TWISPI0;
use embassy_nrf::twim::Twim;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::I2CDisplayInterface;
use ssd1306::Ssd1306;

/// Concrete display driver on the board's I²C bus.
pub type Oled = Ssd1306<
    I2CInterface<Twim<'static, TWISPI0>>,
    DisplaySize128x32,
    BufferedGraphicsMode<DisplaySize128x32>,
>;

/// Panel plus its power flag, shared by the display task and the sleep path.
pub struct Panel {
    oled: Oled,
    powered: bool,
}

pub type SharedPanel = Mutex<ThreadModeRawMutex, RefCell<Panel>>;

/// Initialise the SSD1306 and clear the screen.
pub fn init(i2c: Twim<'static, TWISPI0>) -> Result<Panel> {
    let interface = I2CDisplayInterface::new(i2c);
    let mut oled = Ssd1306::new(interface, DisplaySize128x32, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    oled.init().map_err(|_| Error::Display)?;
    oled.clear_buffer();
    oled.flush().map_err(|_| Error::Display)?;
    Ok(Panel {
        oled,
        powered: true,
    })
}

// Seven-segment cell geometry. The figure is inset so adjacent digits
// keep a gap.
const SEG_INSET: i32 = 2;
const SEG_W: u32 = 18;
const SEG_H: u32 = 30;
const SEG_T: u32 = 4;
const SEG_V: u32 = (SEG_H - 3 * SEG_T) / 2;

/// Segment bits `gfedcba` for 0-9.
const DIGIT_SEGMENTS: [u8; 10] = [0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F];
const MINUS_SEGMENTS: u8 = 0x40;

const DOT_SIZE: u32 = 4;

fn fill() -> PrimitiveStyle<BinaryColor> {
    PrimitiveStyle::with_fill(BinaryColor::On)
}

fn draw_segments(oled: &mut Oled, mask: u8, x: i32, y: i32) {
    let ox = x + SEG_INSET;
    let (w, t, v) = (SEG_W as i32, SEG_T as i32, SEG_V as i32);
    let horizontal = Size::new(SEG_W - 2 * SEG_T, SEG_T);
    let vertical = Size::new(SEG_T, SEG_V);

    let segments: [(Point, Size); 7] = [
        (Point::new(ox + t, y), horizontal),                 // a
        (Point::new(ox + w - t, y + t), vertical),           // b
        (Point::new(ox + w - t, y + 2 * t + v), vertical),   // c
        (Point::new(ox + t, y + 3 * t + 2 * v), horizontal), // d
        (Point::new(ox, y + 2 * t + v), vertical),           // e
        (Point::new(ox, y + t), vertical),                   // f
        (Point::new(ox + t, y + t + v), horizontal),         // g
    ];
    for (bit, (origin, size)) in segments.into_iter().enumerate() {
        if mask & (1 << bit) != 0 {
            let _ = Rectangle::new(origin, size).into_styled(fill()).draw(oled);
        }
    }
}

fn draw_text(oled: &mut Oled, text: &str, font: &'static MonoFont<'static>, x: i32, y: i32) {
    let style = MonoTextStyle::new(font, BinaryColor::On);
    let _ = Text::with_baseline(text, Point::new(x, y), style, Baseline::Top).draw(oled);
}

fn draw_battery(oled: &mut Oled, x: i32, y: i32) {
    let outline = PrimitiveStyle::with_stroke(BinaryColor::On, 1);
    let _ = Rectangle::new(Point::new(x, y), Size::new(9, 6))
        .into_styled(outline)
        .draw(oled);
    let _ = Rectangle::new(Point::new(x + 9, y + 2), Size::new(1, 2))
        .into_styled(fill())
        .draw(oled);
    // Single bar: nearly empty.
    let _ = Rectangle::new(Point::new(x + 2, y + 2), Size::new(1, 2))
        .into_styled(fill())
        .draw(oled);
}

/// Cheap, copyable handle onto the shared panel.
#[derive(Clone, Copy)]
pub struct OledHandle {
    panel: &'static SharedPanel,
}

impl OledHandle {
    pub fn new(panel: &'static SharedPanel) -> Self {
        Self { panel }
    }

    pub fn is_powered(&self) -> bool {
        self.panel.lock(|p| p.borrow().powered)
    }
}

impl WeightDisplay for OledHandle {
    fn clear(&mut self) {
        self.panel.lock(|p| p.borrow_mut().oled.clear_buffer());
    }

    fn draw_glyph(&mut self, glyph: Glyph, x: i32, y: i32) {
        self.panel.lock(|p| {
            let mut panel = p.borrow_mut();
            let oled = &mut panel.oled;
            match glyph {
                Glyph::Digit(n) => {
                    if let Some(&mask) = DIGIT_SEGMENTS.get(usize::from(n)) {
                        draw_segments(oled, mask, x, y);
                    }
                }
                Glyph::Minus => draw_segments(oled, MINUS_SEGMENTS, x, y),
                Glyph::Dot => {
                    let _ = Rectangle::new(Point::new(x + 1, y), Size::new(DOT_SIZE, DOT_SIZE))
                        .into_styled(fill())
                        .draw(oled);
                }
                Glyph::Gram => draw_text(oled, "g", &FONT_6X10, x, y),
                Glyph::Battery => draw_battery(oled, x, y),
                Glyph::Logo => draw_text(oled, "BLE", &FONT_10X20, x, y),
            }
        });
    }

    fn present(&mut self) -> Result<()> {
        self.panel.lock(|p| {
            let mut panel = p.borrow_mut();
            if !panel.powered {
                return Ok(());
            }
            panel.oled.flush().map_err(|_| Error::Display)
        })
    }

    fn power_off(&mut self) -> Result<()> {
        self.panel.lock(|p| {
            let mut panel = p.borrow_mut();
            panel.powered = false;
            panel
                .oled
                .set_display_on(false)
                .map_err(|_| Error::PowerDown(Peripheral::Display))
        })
    }
}
