//! Power state machine: active sampling, tare, and deep sleep.
//!
//! ```text
//!            tare                 sleep
//!   Active ◀─────▶ TareReset     Active ─────▶ Sleeping (terminal)
//! ```
//!
//! `TareReset` is transient: it is entered and left within one call.
//! `Sleeping` is never left; after the peripherals are shut down the
//! owner hands control to [`PowerPlatform::deep_sleep`], and the next
//! wake starts the firmware from reset.

use crate::config::{RESET_BUTTON_PIN, SLEEP_BUTTON_PIN, TARE_SAMPLES};
use crate::drivers::{LoadCell, PowerPlatform, WakeLevel, WeightDisplay};
use crate::error::{Peripheral, Result};
use crate::estimator::Estimator;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Normal operation - sampling, display and BLE running.
    Active,
    /// Re-zeroing filter and load cell.
    TareReset,
    /// Peripherals off, waiting for the deep-sleep primitive.
    Sleeping,
}

/// What went wrong on the way into sleep. Power-down is best-effort:
/// a failed peripheral is recorded here and sleep proceeds anyway.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SleepReport {
    pub display_fault: bool,
    pub load_cell_fault: bool,
}

impl SleepReport {
    pub fn is_clean(&self) -> bool {
        !self.display_fault && !self.load_cell_fault
    }

    fn record(&mut self, peripheral: Peripheral) {
        match peripheral {
            Peripheral::Display => self.display_fault = true,
            Peripheral::LoadCell => self.load_cell_fault = true,
        }
    }
}

pub struct PowerStateMachine {
    state: PowerState,
}

impl PowerStateMachine {
    pub const fn new() -> Self {
        Self {
            state: PowerState::Active,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn is_sleeping(&self) -> bool {
        self.state == PowerState::Sleeping
    }

    /// Active → TareReset → Active: zero the filter and re-tare the load cell.
    ///
    /// The filter is zeroed even if the load-cell tare fails, so the
    /// display goes to zero immediately; the error is returned for logging.
    /// Ignored (returns `Ok(false)`) unless the machine is `Active`.
    pub fn tare<L: LoadCell>(&mut self, estimator: &mut Estimator, load_cell: &mut L) -> Result<bool> {
        if self.state != PowerState::Active {
            debug!("power: tare ignored in {:?}", self.state);
            return Ok(false);
        }

        self.state = PowerState::TareReset;
        info!("power: tare scale");
        estimator.reset();
        let result = load_cell.tare(TARE_SAMPLES);
        self.state = PowerState::Active;
        result.map(|()| true)
    }

    /// Active → Sleeping: shut peripherals down and arm the wake source.
    ///
    /// Returns `None` if already sleeping. The caller must follow up with
    /// `PowerPlatform::deep_sleep`.
    pub fn prepare_sleep<D, L, P>(
        &mut self,
        display: &mut D,
        load_cell: &mut L,
        platform: &mut P,
    ) -> Option<SleepReport>
    where
        D: WeightDisplay,
        L: LoadCell,
        P: PowerPlatform,
    {
        if self.state == PowerState::Sleeping {
            return None;
        }
        info!("power: {:?} -> Sleeping", self.state);
        self.state = PowerState::Sleeping;

        let mut report = SleepReport::default();
        if let Err(e) = display.power_off() {
            warn!("power: display power-off failed: {:?}", e);
            report.record(Peripheral::Display);
        }
        if let Err(e) = load_cell.power_down() {
            warn!("power: load cell power-down failed: {:?}", e);
            report.record(Peripheral::LoadCell);
        }

        platform.release_pull(SLEEP_BUTTON_PIN);
        platform.configure_wake_source(RESET_BUTTON_PIN, WakeLevel::High);

        if !report.is_clean() {
            // A peripheral left powered costs battery until the next wake.
            warn!("power: entering deep sleep with {:?}", report);
        }
        Some(report)
    }
}

impl Default for PowerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{Glyph, ResetCause};
    use crate::error::{Error, SensorFault};

    #[derive(Default)]
    struct Cell {
        fail_power_down: bool,
        fail_tare: bool,
        tares: u32,
        power_downs: u32,
    }

    impl LoadCell for Cell {
        fn set_scale(&mut self, _factor: f32) {}

        fn tare(&mut self, _samples: u8) -> Result<()> {
            self.tares += 1;
            if self.fail_tare {
                return Err(SensorFault::Timeout.into());
            }
            Ok(())
        }

        fn read_raw(&mut self, _times: u8) -> Result<i32> {
            Ok(0)
        }

        fn read_calibrated(&mut self, _times: u8) -> Result<f32> {
            Ok(0.0)
        }

        fn power_down(&mut self) -> Result<()> {
            self.power_downs += 1;
            if self.fail_power_down {
                return Err(Error::PowerDown(Peripheral::LoadCell));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Panel {
        fail_power_off: bool,
        power_offs: u32,
    }

    impl WeightDisplay for Panel {
        fn clear(&mut self) {}

        fn draw_glyph(&mut self, _glyph: Glyph, _x: i32, _y: i32) {}

        fn present(&mut self) -> Result<()> {
            Ok(())
        }

        fn power_off(&mut self) -> Result<()> {
            self.power_offs += 1;
            if self.fail_power_off {
                return Err(Error::PowerDown(Peripheral::Display));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Chip {
        released: Option<u8>,
        wake: Option<(u8, WakeLevel)>,
    }

    impl PowerPlatform for Chip {
        fn reset_cause(&self) -> ResetCause {
            ResetCause::PowerOn
        }

        fn release_pull(&mut self, pin: u8) {
            self.released = Some(pin);
        }

        fn configure_wake_source(&mut self, pin: u8, level: WakeLevel) {
            self.wake = Some((pin, level));
        }

        fn deep_sleep(&mut self) -> ! {
            unreachable!("state machine never sleeps by itself")
        }
    }

    fn estimator_at(value: f32) -> Estimator {
        let mut estimator = Estimator::new(0.0, 0.1);
        estimator.force_estimate(value);
        estimator
    }

    #[test]
    fn tare_zeroes_filter_and_returns_to_active() {
        let mut power = PowerStateMachine::new();
        let mut estimator = estimator_at(42.0);
        let mut cell = Cell::default();

        assert_eq!(power.tare(&mut estimator, &mut cell), Ok(true));
        assert_eq!(estimator.estimate(), 0.0);
        assert_eq!(cell.tares, 1);
        assert_eq!(power.state(), PowerState::Active);
    }

    #[test]
    fn failed_tare_still_zeroes_filter() {
        let mut power = PowerStateMachine::new();
        let mut estimator = estimator_at(42.0);
        let mut cell = Cell {
            fail_tare: true,
            ..Cell::default()
        };

        assert_eq!(
            power.tare(&mut estimator, &mut cell),
            Err(Error::Sensor(SensorFault::Timeout))
        );
        assert_eq!(estimator.estimate(), 0.0);
        assert_eq!(power.state(), PowerState::Active);
    }

    #[test]
    fn clean_sleep_arms_reset_button_only() {
        let mut power = PowerStateMachine::new();
        let (mut panel, mut cell, mut chip) = (Panel::default(), Cell::default(), Chip::default());

        let report = power.prepare_sleep(&mut panel, &mut cell, &mut chip);

        assert_eq!(report, Some(SleepReport::default()));
        assert!(power.is_sleeping());
        assert_eq!((panel.power_offs, cell.power_downs), (1, 1));
        assert_eq!(chip.released, Some(SLEEP_BUTTON_PIN));
        assert_eq!(chip.wake, Some((RESET_BUTTON_PIN, WakeLevel::High)));
    }

    #[test]
    fn second_sleep_request_is_ignored() {
        let mut power = PowerStateMachine::new();
        let (mut panel, mut cell, mut chip) = (Panel::default(), Cell::default(), Chip::default());

        assert!(power.prepare_sleep(&mut panel, &mut cell, &mut chip).is_some());
        assert_eq!(power.prepare_sleep(&mut panel, &mut cell, &mut chip), None);
        assert_eq!((panel.power_offs, cell.power_downs), (1, 1));
    }

    #[test]
    fn tare_is_ignored_while_sleeping() {
        let mut power = PowerStateMachine::new();
        let (mut panel, mut cell, mut chip) = (Panel::default(), Cell::default(), Chip::default());
        power.prepare_sleep(&mut panel, &mut cell, &mut chip);

        let mut estimator = estimator_at(7.0);
        assert_eq!(power.tare(&mut estimator, &mut cell), Ok(false));
        assert_eq!(estimator.estimate(), 7.0);
        assert_eq!(cell.tares, 0);
        assert_eq!(power.state(), PowerState::Sleeping);
    }

    #[test]
    fn report_flags_each_failing_peripheral() {
        let cases = [
            (true, false, SleepReport { display_fault: true, load_cell_fault: false }),
            (false, true, SleepReport { display_fault: false, load_cell_fault: true }),
            (true, true, SleepReport { display_fault: true, load_cell_fault: true }),
        ];
        for (display_fails, cell_fails, expected) in cases {
            let mut power = PowerStateMachine::new();
            let mut panel = Panel {
                fail_power_off: display_fails,
                ..Panel::default()
            };
            let mut cell = Cell {
                fail_power_down: cell_fails,
                ..Cell::default()
            };
            let mut chip = Chip::default();

            let report = power.prepare_sleep(&mut panel, &mut cell, &mut chip);

            assert_eq!(report, Some(expected));
            assert!(!expected.is_clean());
            // Both are attempted and the wake source is armed regardless.
            assert_eq!((panel.power_offs, cell.power_downs), (1, 1));
            assert_eq!(chip.wake, Some((RESET_BUTTON_PIN, WakeLevel::High)));
        }
    }
}
