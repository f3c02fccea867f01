//! Host mocks for the collaborator traits, plus a millisecond-step
//! simulator for driving a `DebouncedSwitch` from a pin waveform.

#![allow(dead_code)]

use ble_scale::debounce::{
    Binding, DebouncedSwitch, DispatchQueue, OneShotTimer, Outcome, SwitchInput,
};
use ble_scale::drivers::{
    Glyph, LoadCell, PowerPlatform, ResetCause, WakeLevel, WeightDisplay, WeightService,
};
use ble_scale::error::{Error, Peripheral, Result, SensorFault};

// ═══════════════════════════════════════════════════════════════════════════
// Collaborators
// ═══════════════════════════════════════════════════════════════════════════

/// Load cell with a mass on the platform; `tare` zeroes at the current load.
#[derive(Debug, Default)]
pub struct MockLoadCell {
    pub load: f32,
    pub offset: f32,
    pub scale: f32,
    /// Number of upcoming reads that fail with a timeout.
    pub pending_faults: u32,
    pub fail_tare: bool,
    /// Collect tare samples from the following reads instead of at once.
    pub deferred_tare: bool,
    pub settling: u8,
    pub fail_power_down: bool,
    pub tares: u32,
    pub last_tare_samples: Option<u8>,
    pub power_downs: u32,
    pub reads: u32,
}

impl MockLoadCell {
    pub fn with_load(load: f32) -> Self {
        Self {
            load,
            scale: 1.0,
            ..Self::default()
        }
    }
}

impl LoadCell for MockLoadCell {
    fn set_scale(&mut self, factor: f32) {
        self.scale = factor;
    }

    fn tare(&mut self, samples: u8) -> Result<()> {
        self.tares += 1;
        self.last_tare_samples = Some(samples);
        if self.fail_tare {
            return Err(SensorFault::Timeout.into());
        }
        if self.deferred_tare {
            self.settling = samples.max(1);
        } else {
            self.offset = self.load;
        }
        Ok(())
    }

    fn read_raw(&mut self, _times: u8) -> Result<i32> {
        Ok((self.load * self.scale) as i32)
    }

    fn read_calibrated(&mut self, _times: u8) -> Result<f32> {
        self.reads += 1;
        if self.pending_faults > 0 {
            self.pending_faults -= 1;
            return Err(SensorFault::Timeout.into());
        }
        if self.settling > 0 {
            self.settling -= 1;
            if self.settling == 0 {
                self.offset = self.load;
            }
            return Err(SensorFault::Settling.into());
        }
        Ok(self.load - self.offset)
    }

    fn power_down(&mut self) -> Result<()> {
        self.power_downs += 1;
        if self.fail_power_down {
            Err(Error::PowerDown(Peripheral::LoadCell))
        } else {
            Ok(())
        }
    }
}

/// Records every value pushed to the BLE service.
#[derive(Debug, Default)]
pub struct MockService {
    pub battery: Option<u8>,
    pub weights: Vec<(f32, bool)>,
}

impl WeightService for MockService {
    fn set_battery_level(&mut self, percent: u8) {
        self.battery = Some(percent);
    }

    fn set_weight(&mut self, value: f32, notify: bool) {
        self.weights.push((value, notify));
    }
}

#[derive(Debug)]
pub struct MockDisplay {
    pub powered: bool,
    pub fail_power_off: bool,
    pub power_offs: u32,
    pub frames: u32,
    pub glyphs: Vec<(Glyph, i32, i32)>,
}

impl Default for MockDisplay {
    fn default() -> Self {
        Self {
            powered: true,
            fail_power_off: false,
            power_offs: 0,
            frames: 0,
            glyphs: Vec::new(),
        }
    }
}

impl WeightDisplay for MockDisplay {
    fn clear(&mut self) {
        self.glyphs.clear();
    }

    fn draw_glyph(&mut self, glyph: Glyph, x: i32, y: i32) {
        self.glyphs.push((glyph, x, y));
    }

    fn present(&mut self) -> Result<()> {
        if self.powered {
            self.frames += 1;
        }
        Ok(())
    }

    fn power_off(&mut self) -> Result<()> {
        self.power_offs += 1;
        if self.fail_power_off {
            return Err(Error::PowerDown(Peripheral::Display));
        }
        self.powered = false;
        Ok(())
    }
}

/// Platform whose deep-sleep primitive panics, so tests can observe it.
///
/// `sensing` mirrors the per-pin SENSE configuration: every pin listed
/// there would wake the chip.
#[derive(Debug)]
pub struct MockPlatform {
    pub cause: ResetCause,
    pub released_pulls: Vec<u8>,
    pub wake_source: Option<(u8, WakeLevel)>,
    pub sensing: Vec<(u8, WakeLevel)>,
}

impl MockPlatform {
    /// Pin left sensing by a GPIO wait that was still pending.
    pub fn with_pending_wait(pin: u8, level: WakeLevel) -> Self {
        Self {
            sensing: vec![(pin, level)],
            ..Self::default()
        }
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            cause: ResetCause::PowerOn,
            released_pulls: Vec::new(),
            wake_source: None,
            sensing: Vec::new(),
        }
    }
}

impl PowerPlatform for MockPlatform {
    fn reset_cause(&self) -> ResetCause {
        self.cause
    }

    fn release_pull(&mut self, pin: u8) {
        self.released_pulls.push(pin);
        self.sensing.retain(|&(p, _)| p != pin);
    }

    fn configure_wake_source(&mut self, pin: u8, level: WakeLevel) {
        self.wake_source = Some((pin, level));
        self.sensing.retain(|&(p, _)| p != pin);
        self.sensing.push((pin, level));
    }

    fn deep_sleep(&mut self) -> ! {
        panic!("deep sleep entered");
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Switch simulator
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct SimPin {
    pub level: bool,
    pub irq: bool,
}

impl SwitchInput for SimPin {
    fn is_asserted(&mut self) -> bool {
        self.level
    }

    fn set_edge_interrupt(&mut self, enabled: bool) {
        self.irq = enabled;
    }
}

#[derive(Debug, Default)]
pub struct SimTimer {
    pub now: u64,
    pub deadline: Option<u64>,
}

impl OneShotTimer for SimTimer {
    fn start(&mut self, delay_ms: u32) {
        self.deadline = Some(self.now + u64::from(delay_ms));
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }
}

pub type SimSwitch<C> = DebouncedSwitch<SimPin, SimTimer, C, ()>;

/// One switch on a simulated 1 ms timebase.
pub struct SwitchSim<C> {
    pub switch: SimSwitch<C>,
    pub now: u64,
    pub outcomes: Vec<(u64, Outcome)>,
}

impl<C> SwitchSim<C> {
    pub fn new(binding: Binding<C, ()>, delay_ms: u32) -> Self {
        Self {
            switch: DebouncedSwitch::new(
                SimPin::default(),
                SimTimer::default(),
                Some(binding),
                delay_ms,
            ),
            now: 0,
            outcomes: Vec::new(),
        }
    }

    /// Advance one millisecond with the pin at `level`.
    ///
    /// Order within a tick: a timer expiring now fires first and samples
    /// the level held through the previous millisecond, then the pin takes
    /// `level` and a rising edge is delivered if the interrupt is armed.
    pub fn tick<const N: usize>(&mut self, level: bool, queue: &DispatchQueue<C, (), N>) {
        let now = self.now;
        let (_, timer) = self.switch.io();
        timer.now = now;
        let expired = timer.deadline == Some(now);
        if expired {
            timer.deadline = None;
            let outcome = self.switch.on_timer_expired(queue);
            self.outcomes.push((now, outcome));
        }

        let (pin, _) = self.switch.io();
        let rising = level && !pin.level;
        pin.level = level;
        if rising && pin.irq {
            self.switch.on_edge();
        }
        self.now += 1;
    }

    /// Hold `level` for `ms` milliseconds.
    pub fn hold<const N: usize>(&mut self, level: bool, ms: u64, queue: &DispatchQueue<C, (), N>) {
        for _ in 0..ms {
            self.tick(level, queue);
        }
    }

    pub fn dispatched(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == Outcome::Dispatched)
            .count()
    }
}
