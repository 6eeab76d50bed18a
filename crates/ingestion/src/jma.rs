//! Jurik-style adaptive moving average.
//!
//! A low-lag recursive smoother. Each update depends only on the new value and
//! the previous [`JmaState`], so a stream can be replayed tick by tick.

use serde::{Deserialize, Serialize};

/// Internal recursion state of the filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JmaState {
    /// Adaptive EMA of the input.
    pub e0: f64,
    /// Smoothed momentum of the input around `e0`.
    pub e1: f64,
    /// Second-stage Kalman-like correction.
    pub e2: f64,
    /// Current smoothed value.
    pub jma: f64,
}

impl JmaState {
    /// Seed state for a new stream starting at `value`.
    pub fn seed(value: f64) -> Self {
        Self {
            e0: value,
            e1: 0.0,
            e2: 0.0,
            jma: value,
        }
    }
}

/// Filter coefficients derived from length, power and phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JmaFilter {
    alpha: f64,
    beta: f64,
    phase_ratio: f64,
}

impl JmaFilter {
    /// Create a filter.
    ///
    /// # Arguments
    /// * `length` - Smoothing length; 1 disables smoothing
    /// * `power` - Exponent applied to the smoothing factor
    /// * `phase` - Overshoot control, clamped to [-100, 100]
    pub fn new(length: usize, power: f64, phase: f64) -> Self {
        let phase_ratio = if phase < -100.0 {
            0.5
        } else if phase > 100.0 {
            2.5
        } else {
            phase / 100.0 + 1.5
        };
        let span = 0.45 * (length.max(1) - 1) as f64;
        let beta = span / (span + 2.0);
        let alpha = beta.powf(power);

        Self {
            alpha,
            beta,
            phase_ratio,
        }
    }

    /// Advance the recursion by one value.
    pub fn update(&self, value: f64, prior: &JmaState) -> JmaState {
        let alpha = self.alpha;
        let beta = self.beta;

        let e0 = (1.0 - alpha) * value + alpha * prior.e0;
        let e1 = (value - e0) * (1.0 - beta) + beta * prior.e1;
        let e2 = (e0 + self.phase_ratio * e1 - prior.jma) * (1.0 - alpha).powi(2)
            + alpha.powi(2) * prior.e2;
        let jma = e2 + prior.jma;

        JmaState { e0, e1, e2, jma }
    }
}

/// One-shot form of [`JmaFilter::update`].
pub fn jma_update(value: f64, prior: &JmaState, length: usize, power: f64, phase: f64) -> JmaState {
    JmaFilter::new(length, power, phase).update(value, prior)
}
