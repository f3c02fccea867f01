//! Application context: everything the sampling task owns.
//!
//! Button callbacks are dispatched against a `&mut ScaleApp`, on the same
//! task that runs the sampling loop, so the filter is never touched by two
//! execution paths at once.

use crate::debounce::{Binding, DispatchQueue};
use crate::drivers::{LoadCell, PowerPlatform, WeightDisplay, WeightService};
use crate::power_logic::{PowerState, PowerStateMachine, SleepReport};
use crate::sampling::{Sampler, Tick};
use crate::weight::SharedWeight;

/// Outcome of [`ScaleApp::step`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Keep looping.
    Continue(Tick),
    /// Sleep was requested; call [`ScaleApp::sleep`].
    Sleep,
}

pub struct ScaleApp<'w, L, S, D, P> {
    load_cell: L,
    service: S,
    display: D,
    platform: P,
    sampler: Sampler,
    power: PowerStateMachine,
    sleep_report: Option<SleepReport>,
    weight: &'w SharedWeight,
}

impl<'w, L, S, D, P> ScaleApp<'w, L, S, D, P>
where
    L: LoadCell,
    S: WeightService,
    D: WeightDisplay,
    P: PowerPlatform,
{
    pub fn new(
        load_cell: L,
        service: S,
        display: D,
        platform: P,
        sampler: Sampler,
        weight: &'w SharedWeight,
    ) -> Self {
        Self {
            load_cell,
            service,
            display,
            platform,
            sampler,
            power: PowerStateMachine::new(),
            sleep_report: None,
            weight,
        }
    }

    /// Binding for the reset (tare) button.
    pub fn tare_binding() -> Binding<Self, ()> {
        Binding::new(Self::on_tare_pressed, ())
    }

    /// Binding for the sleep button.
    pub fn sleep_binding() -> Binding<Self, ()> {
        Binding::new(Self::on_sleep_pressed, ())
    }

    /// Reset button callback. Runs from the dispatch queue.
    pub fn on_tare_pressed(&mut self, _arg: ()) {
        match self
            .power
            .tare(self.sampler.estimator_mut(), &mut self.load_cell)
        {
            Ok(true) => self.weight.store(self.sampler.estimator().estimate()),
            Ok(false) => {}
            Err(e) => {
                self.weight.store(self.sampler.estimator().estimate());
                warn!("app: load cell tare failed: {:?}", e);
            }
        }
    }

    /// Sleep button callback. Runs from the dispatch queue; the terminal
    /// deep-sleep call is left to the loop owner via [`Step::Sleep`].
    pub fn on_sleep_pressed(&mut self, _arg: ()) {
        if let Some(report) =
            self.power
                .prepare_sleep(&mut self.display, &mut self.load_cell, &mut self.platform)
        {
            self.sleep_report = Some(report);
        }
    }

    /// Seed the filter before the loop starts.
    pub fn seed(&mut self) {
        self.sampler.seed(&mut self.load_cell, self.weight);
    }

    /// One sampling-loop iteration: run deferred callbacks, then sample.
    pub fn step<const N: usize>(&mut self, queue: &DispatchQueue<Self, (), N>, now_ms: u64) -> Step {
        queue.drain(self);
        if self.power.is_sleeping() {
            return Step::Sleep;
        }
        Step::Continue(self.sampler.tick(
            now_ms,
            &mut self.load_cell,
            &mut self.service,
            self.weight,
        ))
    }

    /// Hand over to the platform's deep-sleep primitive. Never returns.
    ///
    /// If sleep was not prepared yet (no button press), peripherals are
    /// shut down first.
    pub fn sleep(mut self) -> ! {
        if !self.power.is_sleeping() {
            self.on_sleep_pressed(());
        }
        info!("app: deep sleep");
        self.platform.deep_sleep()
    }

    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    /// Peripheral faults recorded on the way into sleep, once prepared.
    pub fn sleep_report(&self) -> Option<SleepReport> {
        self.sleep_report
    }

    pub fn estimate(&self) -> f32 {
        self.sampler.estimator().estimate()
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn load_cell(&self) -> &L {
        &self.load_cell
    }

    pub fn load_cell_mut(&mut self) -> &mut L {
        &mut self.load_cell
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }
}
