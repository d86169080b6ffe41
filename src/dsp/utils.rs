//! Shared primitives: noise source, one-pole filters, soft clipper, DC blocker.
//!
//! Every generator in the crate builds on these. None of them allocate, and
//! each instance owns its own state so two drums never share a filter memory.

use std::f32::consts::PI;

/// Deterministic white-noise source (32-bit LCG, numerical-recipes constants).
#[derive(Debug, Clone)]
pub struct Noise {
    state: u32,
}

impl Noise {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next sample, roughly uniform in [-1, 1].
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.state as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

/// Mix `salt` into `seed`, giving each noise source its own stream.
#[inline]
pub fn derive_seed(seed: u32, salt: u32) -> u32 {
    seed ^ salt.wrapping_mul(0x9E37_79B9)
}

/// Smoothing coefficient of an RC low-pass at `freq` Hz.
#[inline]
fn lowpass_alpha(freq: f32, sample_rate: f32) -> f32 {
    let rc = 1.0 / (2.0 * PI * freq);
    let dt = 1.0 / sample_rate;
    dt / (rc + dt)
}

/// Feedback coefficient of an RC high-pass at `freq` Hz.
#[inline]
fn highpass_alpha(freq: f32, sample_rate: f32) -> f32 {
    let rc = 1.0 / (2.0 * PI * freq);
    let dt = 1.0 / sample_rate;
    rc / (rc + dt)
}

/// One-pole RC low-pass with a fixed corner.
#[derive(Debug, Clone)]
pub struct OnePoleLowpass {
    alpha: f32,
    state: f32,
}

impl OnePoleLowpass {
    pub fn new(freq: f32, sample_rate: f32) -> Self {
        Self { alpha: lowpass_alpha(freq, sample_rate), state: 0.0 }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state += self.alpha * (input - self.state);
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

/// One-pole RC high-pass with a fixed corner.
#[derive(Debug, Clone)]
pub struct OnePoleHighpass {
    alpha: f32,
    prev_in: f32,
    prev_out: f32,
}

impl OnePoleHighpass {
    pub fn new(freq: f32, sample_rate: f32) -> Self {
        Self { alpha: highpass_alpha(freq, sample_rate), prev_in: 0.0, prev_out: 0.0 }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = self.alpha * (self.prev_out + input - self.prev_in);
        self.prev_in = input;
        self.prev_out = out;
        out
    }

    pub fn reset(&mut self) {
        self.prev_in = 0.0;
        self.prev_out = 0.0;
    }
}

/// Two cascaded one-pole low-passes (12 dB/oct).
#[derive(Debug, Clone)]
pub struct TwoPoleLowpass {
    a: OnePoleLowpass,
    b: OnePoleLowpass,
}

impl TwoPoleLowpass {
    pub fn new(freq: f32, sample_rate: f32) -> Self {
        Self { a: OnePoleLowpass::new(freq, sample_rate), b: OnePoleLowpass::new(freq, sample_rate) }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.b.process(self.a.process(input))
    }
}

/// Two cascaded one-pole high-passes (12 dB/oct).
#[derive(Debug, Clone)]
pub struct TwoPoleHighpass {
    a: OnePoleHighpass,
    b: OnePoleHighpass,
}

impl TwoPoleHighpass {
    pub fn new(freq: f32, sample_rate: f32) -> Self {
        Self { a: OnePoleHighpass::new(freq, sample_rate), b: OnePoleHighpass::new(freq, sample_rate) }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.b.process(self.a.process(input))
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// First-order DC blocker, `y[n] = x[n] - x[n-1] + R·y[n-1]`.
#[derive(Debug, Clone)]
pub struct DcBlocker {
    x1: f32,
    y1: f32,
}

impl DcBlocker {
    const R: f32 = 0.995;

    pub fn new() -> Self {
        Self { x1: 0.0, y1: 0.0 }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.y1 = input - self.x1 + Self::R * self.y1;
        self.x1 = input;
        self.y1
    }
}

impl Default for DcBlocker {
    fn default() -> Self {
        Self::new()
    }
}

/// Sine of a normalised phase in [0, 1).
#[inline]
pub fn sin_phase(phase: f32) -> f32 {
    (2.0 * PI * phase).sin()
}

/// Advance a normalised phase by `inc`, wrapping into [0, 1).
#[inline]
pub fn advance_phase(phase: &mut f32, inc: f32) {
    *phase += inc;
    if *phase >= 1.0 {
        *phase -= phase.floor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_deterministic_and_bounded() {
        let mut a = Noise::new(42);
        let mut b = Noise::new(42);
        for _ in 0..10_000 {
            let x = a.next_sample();
            assert_eq!(x, b.next_sample());
            assert!((-1.0..=1.0).contains(&x), "noise out of range: {x}");
        }
    }

    #[test]
    fn noise_has_near_zero_mean() {
        let mut n = Noise::new(7);
        let sum: f32 = (0..44_100).map(|_| n.next_sample()).sum();
        let mean = sum / 44_100.0;
        assert!(mean.abs() < 0.02, "mean should be near zero, got {mean}");
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = TwoPoleLowpass::new(8000.0, 44100.0);
        let mut out = 0.0;
        for _ in 0..1000 {
            out = f.process(1.0);
        }
        assert!((out - 1.0).abs() < 1e-3, "Lowpass should pass DC, got {out}");
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = TwoPoleHighpass::new(2000.0, 44100.0);
        let mut out = 1.0;
        for _ in 0..2000 {
            out = f.process(1.0);
        }
        assert!(out.abs() < 1e-3, "Highpass should block DC, got {out}");
    }

    #[test]
    fn dc_blocker_removes_offset() {
        let mut dc = DcBlocker::new();
        let mut out = 1.0;
        for _ in 0..20_000 {
            out = dc.process(0.5);
        }
        assert!(out.abs() < 1e-3, "DC offset should decay away, got {out}");
    }

    #[test]
    fn soft_clip_is_bounded() {
        assert!(soft_clip(100.0) <= 1.0);
        assert!(soft_clip(-100.0) >= -1.0);
        assert!((soft_clip(0.01) - 0.01).abs() < 1e-5);
    }

    #[test]
    fn phase_wraps() {
        let mut p = 0.9;
        advance_phase(&mut p, 0.3);
        assert!((p - 0.2).abs() < 1e-6, "phase should wrap to 0.2, got {p}");
    }
}
