//! Frame composition for the 128×32 weight display.
//!
//! The weight text is laid out right-to-left against a fixed edge so the
//! decimal point does not jump around as the value changes.

use crate::battery::BatteryLevel;
use crate::config::{
    BATTERY_POS, DIGIT_WIDTH, DIGIT_Y, DOT_WIDTH, DOT_Y, LOGO_POS, TEXT_RIGHT_EDGE, UNIT_POS,
};
use crate::drivers::{Glyph, WeightDisplay};
use crate::error::Result;
use crate::weight::format_weight;

/// Draw one full frame showing `grams` and push it to the panel.
pub fn render_weight<D: WeightDisplay>(
    display: &mut D,
    grams: f32,
    battery: BatteryLevel,
) -> Result<()> {
    display.clear();

    let text = format_weight(grams);
    let mut x = TEXT_RIGHT_EDGE;
    for ch in text.chars().rev() {
        let (glyph, width, y) = match ch {
            '.' => (Glyph::Dot, DOT_WIDTH, DOT_Y),
            '-' => (Glyph::Minus, DIGIT_WIDTH, DIGIT_Y),
            d => match d.to_digit(10) {
                Some(n) => (Glyph::Digit(n as u8), DIGIT_WIDTH, DIGIT_Y),
                None => continue,
            },
        };
        x -= width;
        if x < 0 {
            break;
        }
        display.draw_glyph(glyph, x, y);
    }

    display.draw_glyph(Glyph::Gram, UNIT_POS.0, UNIT_POS.1);
    if battery.is_low() {
        display.draw_glyph(Glyph::Battery, BATTERY_POS.0, BATTERY_POS.1);
    }
    display.present()
}

/// Boot splash shown while peripherals come up.
pub fn render_logo<D: WeightDisplay>(display: &mut D) -> Result<()> {
    display.clear();
    display.draw_glyph(Glyph::Logo, LOGO_POS.0, LOGO_POS.1);
    display.present()
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Default)]
    struct Frame {
        glyphs: Vec<(Glyph, i32, i32), 16>,
        clears: u32,
        presents: u32,
    }

    impl WeightDisplay for Frame {
        fn clear(&mut self) {
            self.glyphs.clear();
            self.clears += 1;
        }

        fn draw_glyph(&mut self, glyph: Glyph, x: i32, y: i32) {
            self.glyphs.push((glyph, x, y)).unwrap();
        }

        fn present(&mut self) -> Result<()> {
            self.presents += 1;
            Ok(())
        }

        fn power_off(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn digits_are_right_aligned() {
        let mut frame = Frame::default();
        render_weight(&mut frame, 12.34, BatteryLevel::FULL).unwrap();

        // "12.35" right to left.
        assert_eq!(
            frame.glyphs.as_slice(),
            &[
                (Glyph::Digit(5), 96, 1),
                (Glyph::Digit(3), 74, 1),
                (Glyph::Dot, 67, 27),
                (Glyph::Digit(2), 45, 1),
                (Glyph::Digit(1), 23, 1),
                (Glyph::Gram, 117, 16),
            ]
        );
        assert_eq!(frame.clears, 1);
        assert_eq!(frame.presents, 1);
    }

    #[test]
    fn negative_weight_uses_minus_glyph() {
        let mut frame = Frame::default();
        render_weight(&mut frame, -3.0, BatteryLevel::FULL).unwrap();
        // "-3.00"
        assert!(frame.glyphs.contains(&(Glyph::Minus, 23, 1)));
    }

    #[test]
    fn glyphs_past_left_edge_are_clipped() {
        let mut frame = Frame::default();
        render_weight(&mut frame, -9999.9, BatteryLevel::FULL).unwrap();
        // "-9999.9": the minus would start left of x = 0.
        assert!(!frame.glyphs.iter().any(|g| g.0 == Glyph::Minus));
        assert!(frame.glyphs.iter().all(|g| g.1 >= 0));
    }

    #[test]
    fn low_battery_glyph_only_when_low() {
        let mut frame = Frame::default();
        render_weight(&mut frame, 0.0, BatteryLevel::new(20)).unwrap();
        assert!(frame.glyphs.contains(&(Glyph::Battery, 117, 1)));

        render_weight(&mut frame, 0.0, BatteryLevel::new(80)).unwrap();
        assert!(!frame.glyphs.iter().any(|g| g.0 == Glyph::Battery));
    }

    #[test]
    fn logo_frame() {
        let mut frame = Frame::default();
        render_logo(&mut frame).unwrap();
        assert_eq!(frame.glyphs.as_slice(), &[(Glyph::Logo, 51, 1)]);
    }
}
