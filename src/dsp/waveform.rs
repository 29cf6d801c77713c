//! Waveform generation — pure phase → amplitude functions.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

/// Evaluate a waveform at `phase` in [0, 1). Pure and stateless, so it can
/// be called per sample at audio rate.
///
/// The square and sawtooth values returned here are the naive shapes; the
/// oscillator applies PolyBLEP edge correction where the phase increment is
/// known.
#[inline]
pub fn sample(waveform: Waveform, phase: f64) -> f64 {
    match waveform {
        Waveform::Sine => (TAU * phase).sin(),
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        // Piecewise-linear, peaking at phase 0.25 and dipping at 0.75 so the
        // wave starts at zero like the sine.
        Waveform::Triangle => {
            if phase < 0.25 {
                4.0 * phase
            } else if phase < 0.75 {
                2.0 - 4.0 * phase
            } else {
                4.0 * phase - 4.0
            }
        }
        Waveform::Sawtooth => 2.0 * phase - 1.0,
    }
}

/// PolyBLEP (Polynomial Band-Limited Step) correction.
///
/// `t` is the phase [0, 1), `dt` the phase increment per sample. Returns a
/// correction to apply to a naive waveform around its discontinuities.
#[inline]
pub(crate) fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}
