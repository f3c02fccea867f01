//! Single-dimension Kalman filter for the load-cell signal.
//!
//! The weight on the pan is modelled as constant between samples
//! (identity motion model) with process noise `q`; each HX711 sample is
//! a measurement with variance `r`:
//!
//! ```text
//! predict:  p' = p + q
//! gain:     k  = p' / (p' + r)
//! correct:  x  = x + k (z - x)
//!           p  = p' r / (p' + r)
//! ```
//!
//! The covariance update is written as `p' r / (p' + r)` rather than
//! `(1 - k) p'`; it stays within `[0, min(p', r)]` for any non-negative
//! inputs, so an unbounded sample stream cannot drive it negative.

use crate::config::{KALMAN_INITIAL_COVARIANCE, KALMAN_MEASUREMENT_NOISE};

#[derive(Clone, Debug)]
pub struct Estimator {
    estimate: f32,
    covariance: f32,
    initial_covariance: f32,
    process_noise: f32,
    measurement_noise: f32,
}

impl Estimator {
    /// Filter starting at `initial` with process noise `q`.
    ///
    /// Measurement noise and initial covariance come from `config`.
    pub fn new(initial: f32, q: f32) -> Self {
        Self {
            estimate: initial,
            covariance: KALMAN_INITIAL_COVARIANCE,
            initial_covariance: KALMAN_INITIAL_COVARIANCE,
            process_noise: sanitize(q),
            measurement_noise: sanitize(KALMAN_MEASUREMENT_NOISE),
        }
    }

    pub fn with_measurement_noise(mut self, r: f32) -> Self {
        self.measurement_noise = sanitize(r);
        self
    }

    pub fn with_initial_covariance(mut self, p: f32) -> Self {
        self.initial_covariance = sanitize(p);
        self.covariance = self.initial_covariance;
        self
    }

    /// Fold one measurement into the estimate and return the new estimate.
    ///
    /// Non-finite measurements are ignored.
    pub fn update(&mut self, measurement: f32) -> f32 {
        if !measurement.is_finite() {
            return self.estimate;
        }

        let predicted = self.covariance + self.process_noise;
        let total = predicted + self.measurement_noise;
        if total <= 0.0 {
            // q = r = p = 0: nothing is uncertain, trust the measurement.
            self.estimate = measurement;
            return self.estimate;
        }

        let gain = predicted / total;
        self.estimate += gain * (measurement - self.estimate);
        self.covariance = predicted * self.measurement_noise / total;
        self.estimate
    }

    /// Overwrite the estimate, keeping the current covariance.
    pub fn force_estimate(&mut self, value: f32) {
        self.estimate = value;
    }

    /// Zero the estimate and restore the initial covariance (used on tare).
    pub fn reset(&mut self) {
        self.estimate = 0.0;
        self.covariance = self.initial_covariance;
    }

    pub fn estimate(&self) -> f32 {
        self.estimate
    }

    pub fn covariance(&self) -> f32 {
        self.covariance
    }

    pub fn process_noise(&self) -> f32 {
        self.process_noise
    }
}

/// Noise terms must be finite and non-negative.
fn sanitize(v: f32) -> f32 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}
