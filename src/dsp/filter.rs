//! Four-pole nonlinear ladder filter.
//!
//! Each pole is a one-pole low-pass with a tanh stage on both its input and
//! its state, and the resonance path is tanh-saturated as well. The one-pole
//! gain is normalised (`g / (1 + g)`) so a stage can never overshoot its
//! input, which keeps the whole cascade bounded for any cutoff.

use std::f32::consts::PI;

/// Feedback gain at nominal full resonance.
const MAX_FEEDBACK: f32 = 3.8;
/// Resonance is never allowed past this fraction of the nominal maximum.
pub const MAX_RESONANCE: f32 = 0.92;
/// Hard bound for every internal state element.
const STATE_LIMIT: f32 = 8.0;

/// A 4-pole ladder low-pass.
#[derive(Debug, Clone)]
pub struct LadderFilter {
    stages: [f32; 4],
    sample_rate: f32,
    resets: u32,
}

impl LadderFilter {
    pub fn new(sample_rate: f32) -> Self {
        Self { stages: [0.0; 4], sample_rate, resets: 0 }
    }

    /// Filter one sample. `cutoff` in Hz, `resonance` in [0, 0.92].
    #[inline]
    pub fn process(&mut self, input: f32, cutoff: f32, resonance: f32) -> f32 {
        let cutoff = cutoff.clamp(1.0, self.sample_rate * 0.45);
        let g = (PI * cutoff / self.sample_rate).tan();
        let gain = g / (1.0 + g);
        let k = resonance.clamp(0.0, MAX_RESONANCE) * MAX_FEEDBACK;

        let [d1, d2, d3, d4] = self.stages;
        let x = self.guard(input - (d4 * k).tanh());
        let d1 = self.guard(d1 + gain * (x.tanh() - d1.tanh()));
        let d2 = self.guard(d2 + gain * (d1.tanh() - d2.tanh()));
        let d3 = self.guard(d3 + gain * (d2.tanh() - d3.tanh()));
        let d4 = self.guard(d4 + gain * (d3.tanh() - d4.tanh()));
        self.stages = [d1, d2, d3, d4];
        d4
    }

    /// Clamp a state value and zero it if it went non-finite.
    #[inline]
    fn guard(&mut self, x: f32) -> f32 {
        if x.is_finite() {
            x.clamp(-STATE_LIMIT, STATE_LIMIT)
        } else {
            self.resets = self.resets.saturating_add(1);
            0.0
        }
    }

    /// Number of state elements zeroed since the last call.
    pub fn take_resets(&mut self) -> u32 {
        std::mem::take(&mut self.resets)
    }

    /// Reset filter state.
    pub fn reset(&mut self) {
        self.stages = [0.0; 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::utils::Noise;

    #[test]
    fn lowpass_passes_dc() {
        let mut f = LadderFilter::new(44100.0);
        let mut out = 0.0;
        for _ in 0..5000 {
            out = f.process(0.5, 2000.0, 0.0);
        }
        assert!((out - 0.5).abs() < 0.01, "open ladder should pass DC, got {out}");
    }

    #[test]
    fn attenuates_above_cutoff() {
        let sr = 44100.0;
        let mut f = LadderFilter::new(sr);
        let mut max_out = 0.0f32;
        for i in 0..8820 {
            let x = (2.0 * PI * 8000.0 * i as f32 / sr).sin() * 0.5;
            let y = f.process(x, 200.0, 0.0);
            if i > 2000 {
                max_out = max_out.max(y.abs());
            }
        }
        assert!(max_out < 0.01, "ladder@200Hz should crush 8kHz, got {max_out}");
    }

    #[test]
    fn bounded_for_every_resonance() {
        let mut noise = Noise::new(99);
        for step in 0..=23 {
            let resonance = (step as f32 * 0.04).min(MAX_RESONANCE);
            for cutoff in [20.0, 440.0, 5000.0, 20000.0] {
                let mut f = LadderFilter::new(44100.0);
                for i in 0..10_000 {
                    // Mix of full-scale square bursts and noise, all within [-1, 1].
                    let x = if (i / 50) % 2 == 0 { 1.0 } else { noise.next_sample() };
                    let y = f.process(x, cutoff, resonance);
                    assert!(
                        y.is_finite() && y.abs() <= 4.0,
                        "unbounded output {y} at res {resonance} cutoff {cutoff}"
                    );
                }
            }
        }
    }

    #[test]
    fn resonance_is_clamped() {
        let mut a = LadderFilter::new(44100.0);
        let mut b = LadderFilter::new(44100.0);
        for i in 0..1000 {
            let x = if i == 0 { 1.0 } else { 0.0 };
            assert_eq!(a.process(x, 1000.0, 0.92), b.process(x, 1000.0, 5.0));
        }
    }

    #[test]
    fn non_finite_input_is_contained() {
        let mut f = LadderFilter::new(44100.0);
        let y = f.process(f32::NAN, 1000.0, 0.5);
        assert_eq!(y, 0.0);
        assert!(f.take_resets() > 0, "NaN should be counted as a reset");
        let y = f.process(0.2, 1000.0, 0.5);
        assert!(y.is_finite(), "filter should recover after NaN");
        assert_eq!(f.take_resets(), 0);
    }
}
