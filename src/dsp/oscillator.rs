//! Anti-aliased oscillators using PolyBLEP.

use super::utils::{advance_phase, sin_phase};

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Sawtooth,
    Square,
    Triangle,
}

impl Waveform {
    /// Map the continuous `waveform` control (0..=3) onto a shape.
    ///
    /// Values snap to the nearest integer: 0 sine, 1 saw, 2 square, 3 triangle.
    pub fn from_selector(value: f32) -> Self {
        if value < 0.5 {
            Waveform::Sine
        } else if value < 1.5 {
            Waveform::Sawtooth
        } else if value < 2.5 {
            Waveform::Square
        } else {
            Waveform::Triangle
        }
    }
}

/// A band-limited oscillator with anti-aliasing (PolyBLEP).
///
/// The caller supplies the per-sample phase increment so that pitch
/// modulation (drift, detune) stays outside the oscillator.
#[derive(Debug, Clone)]
pub struct Oscillator {
    phase: f32,
}

impl Oscillator {
    pub fn new() -> Self {
        Oscillator { phase: 0.0 }
    }

    /// Current phase in [0, 1).
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Generate the next sample for phase increment `inc` (cycles/sample).
    #[inline]
    pub fn next_sample(&mut self, waveform: Waveform, inc: f32) -> f32 {
        let sample = match waveform {
            Waveform::Sine => sin_phase(self.phase),
            Waveform::Sawtooth => self.sawtooth(inc),
            Waveform::Square => self.square(inc),
            Waveform::Triangle => self.triangle(),
        };
        advance_phase(&mut self.phase, inc);
        sample
    }

    /// Naive sawtooth: rises from -1 to +1, then drops.
    /// PolyBLEP corrects the discontinuity at the wrap.
    fn sawtooth(&self, inc: f32) -> f32 {
        let naive = 2.0 * self.phase - 1.0;
        naive - poly_blep(self.phase, inc)
    }

    /// Square wave with PolyBLEP on both edges.
    fn square(&self, inc: f32) -> f32 {
        let mut value = if self.phase < 0.5 { 1.0 } else { -1.0 };
        value += poly_blep(self.phase, inc);
        value -= poly_blep((self.phase + 0.5) % 1.0, inc);
        value
    }

    /// Piecewise linear, -1→+1 in [0, 0.5], +1→-1 in [0.5, 1].
    fn triangle(&self) -> f32 {
        if self.phase < 0.5 {
            4.0 * self.phase - 1.0
        } else {
            3.0 - 4.0 * self.phase
        }
    }

    /// Reset oscillator phase.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new()
    }
}

/// PolyBLEP (Polynomial Band-Limited Step) anti-aliasing correction.
///
/// `t` is the phase [0, 1), `dt` is the phase increment per sample.
/// Non-zero only within one sample period of the discontinuity.
#[inline]
pub fn poly_blep(t: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }
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
