//! Sampling loop: load cell → Kalman filter → shared weight → BLE.
//!
//! One call to [`Sampler::tick`] is one loop iteration. The caller owns
//! the pacing (a short fixed yield between ticks) and supplies a
//! monotonic millisecond clock, so notification spacing is measured in
//! time rather than in iterations.

use crate::config::SAMPLES_PER_TICK;
use crate::drivers::{LoadCell, WeightService};
use crate::error::{Error, SensorFault};
use crate::estimator::Estimator;
use crate::weight::{quantize, SharedWeight};

/// Rate limiter for BLE notifications.
#[derive(Clone, Debug)]
pub struct NotifyGate {
    interval_ms: u64,
    last_ms: Option<u64>,
}

impl NotifyGate {
    pub const fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_ms: None,
        }
    }

    /// True (and the gate re-closes) if at least `interval_ms` passed since
    /// the last time this returned true. Always true the first time.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let due = match self.last_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        };
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }
}

/// Result of one sampling iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tick {
    /// New estimate stored in the shared weight.
    Sampled(f32),
    /// New estimate stored and its quantised value pushed over BLE.
    Notified(f32),
    /// The load cell failed; nothing changed, retry next tick.
    Skipped(Error),
}

pub struct Sampler {
    estimator: Estimator,
    gate: NotifyGate,
    consecutive_faults: u32,
}

impl Sampler {
    pub fn new(estimator: Estimator, notify_interval_ms: u64) -> Self {
        Self {
            estimator,
            gate: NotifyGate::new(notify_interval_ms),
            consecutive_faults: 0,
        }
    }

    /// Prime the filter with one reading so the first frames are not a
    /// slow ramp up from the initial estimate.
    pub fn seed<L: LoadCell>(&mut self, load_cell: &mut L, weight: &SharedWeight) {
        match load_cell.read_calibrated(SAMPLES_PER_TICK) {
            Ok(grams) => weight.store(self.estimator.update(grams)),
            Err(e) => warn!("sampler: seed reading failed: {:?}", e),
        }
    }

    /// One iteration: read, filter, publish, and maybe notify.
    pub fn tick<L, S>(
        &mut self,
        now_ms: u64,
        load_cell: &mut L,
        service: &mut S,
        weight: &SharedWeight,
    ) -> Tick
    where
        L: LoadCell,
        S: WeightService,
    {
        let grams = match load_cell.read_calibrated(SAMPLES_PER_TICK) {
            Ok(g) if g.is_finite() => g,
            Ok(_) => return self.fault(Error::Sensor(SensorFault::NotFinite)),
            Err(e) => return self.fault(e),
        };
        if self.consecutive_faults > 0 {
            info!("sampler: load cell back after {} faults", self.consecutive_faults);
            self.consecutive_faults = 0;
        }

        let filtered = self.estimator.update(grams);
        weight.store(filtered);

        if self.gate.poll(now_ms) {
            service.set_weight(quantize(filtered), true);
            Tick::Notified(filtered)
        } else {
            Tick::Sampled(filtered)
        }
    }

    fn fault(&mut self, e: Error) -> Tick {
        self.consecutive_faults = self.consecutive_faults.saturating_add(1);
        warn!(
            "sampler: skipping tick ({:?}), {} in a row",
            e,
            self.consecutive_faults
        );
        Tick::Skipped(e)
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut Estimator {
        &mut self.estimator
    }

    pub fn consecutive_faults(&self) -> u32 {
        self.consecutive_faults
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_opens_first_time_then_every_interval() {
        let mut gate = NotifyGate::new(100);
        assert!(gate.poll(5));
        assert!(!gate.poll(6));
        assert!(!gate.poll(104));
        assert!(gate.poll(105));
        assert!(!gate.poll(150));
        assert!(gate.poll(400));
    }

    #[test]
    fn gate_tolerates_clock_going_backwards() {
        let mut gate = NotifyGate::new(100);
        assert!(gate.poll(1000));
        assert!(!gate.poll(10));
    }
}
