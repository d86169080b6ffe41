//! Master effects chain: drive, then delay, then reverb.

use std::f32::consts::FRAC_PI_2;

use super::delay::Delay;
use super::params::ParamSnapshot;
use super::reverb::Reverb;

/// Arctangent waveshaper. Identity at `amount == 0`.
#[inline]
pub fn drive(x: f32, amount: f32) -> f32 {
    if amount <= 0.0 {
        return x;
    }
    (x * (1.0 + 10.0 * amount)).atan() / FRAC_PI_2 * 0.8
}

/// Stereo post-processing applied to the summed instrument output.
///
/// Each stage is skipped entirely when its amount is exactly zero.
#[derive(Debug, Clone)]
pub struct EffectsChain {
    delay: Delay,
    reverb: Reverb,
}

impl EffectsChain {
    pub fn new(sample_rate: f32, reverb_diffusion: bool) -> Self {
        Self { delay: Delay::new(sample_rate), reverb: Reverb::new(sample_rate, reverb_diffusion) }
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32, params: &ParamSnapshot) -> (f32, f32) {
        let (l, r) = (drive(left, params.drive), drive(right, params.drive));
        let (l, r) = self.delay.process(l, r, params.delay_time, params.delay_feedback, params.delay_mix);
        self.reverb.process(l, r, params.reverb_mix)
    }

    pub fn clear(&mut self) {
        self.delay.clear();
        self.reverb.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dry() -> ParamSnapshot {
        ParamSnapshot { drive: 0.0, delay_mix: 0.0, reverb_mix: 0.0, ..ParamSnapshot::default() }
    }

    #[test]
    fn all_zero_is_identity() {
        let mut fx = EffectsChain::new(44100.0, true);
        let p = dry();
        for i in 0..5000 {
            let x = (i as f32 * 0.013).sin() * 0.9;
            assert_eq!(fx.process(x, -x, &p), (x, -x));
        }
    }

    #[test]
    fn drive_is_bounded_and_odd() {
        for amount in [0.1, 0.5, 1.0] {
            for x in [-4.0, -1.0, -0.2, 0.2, 1.0, 4.0] {
                let y = drive(x, amount);
                assert!(y.abs() < 0.8);
                assert!((drive(-x, amount) + y).abs() < 1e-6);
            }
        }
        assert_eq!(drive(0.7, 0.0), 0.7);
    }

    #[test]
    fn reverb_follows_delay() {
        let mut fx = EffectsChain::new(1000.0, false);
        let p = ParamSnapshot {
            delay_mix: 1.0,
            delay_time: 0.0105,
            delay_feedback: 0.0,
            ..dry()
        };
        let out: Vec<f32> = (0..12)
            .map(|i| fx.process(if i == 0 { 1.0 } else { 0.0 }, 0.0, &p).0)
            .collect();
        assert_eq!(out[0], 0.0);
        assert_eq!(out[10], 1.0);
    }
}
