//! Drum synthesis: kick, snare and hi-hat.
//!
//! Each drum is a pure tone generator. Level envelopes, the kick's pitch
//! sweep and DC blocking are applied by the instrument unit around it.

use super::utils::{
    advance_phase, sin_phase, soft_clip, Noise, TwoPoleHighpass, TwoPoleLowpass,
};

/// Click transient pitch in Hz.
const KICK_CLICK_FREQ: f32 = 1200.0;
/// Click decay time constant in seconds.
const KICK_CLICK_TAU: f32 = 0.008;

/// Sine body with a short high click on top.
#[derive(Debug, Clone)]
pub struct Kick {
    body_phase: f32,
    click_phase: f32,
    click_env: f32,
    click_decay: f32,
    sample_rate: f32,
}

impl Kick {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            body_phase: 0.0,
            click_phase: 0.0,
            click_env: 0.0,
            click_decay: (-1.0 / (KICK_CLICK_TAU * sample_rate)).exp(),
            sample_rate,
        }
    }

    pub fn trigger(&mut self) {
        self.body_phase = 0.0;
        self.click_phase = 0.0;
        self.click_env = 1.0;
    }

    /// One sample with the body at `frequency` Hz.
    #[inline]
    pub fn render(&mut self, frequency: f32) -> f32 {
        let body = sin_phase(self.body_phase);
        advance_phase(&mut self.body_phase, frequency / self.sample_rate);

        let click = sin_phase(self.click_phase) * 0.3 * self.click_env;
        advance_phase(&mut self.click_phase, KICK_CLICK_FREQ / self.sample_rate);
        self.click_env *= self.click_decay;

        soft_clip((body * 0.85 + click * 0.15) * 1.2)
    }
}

/// Snare body pitch when the note does not give one.
pub const SNARE_BODY_FREQ: f32 = 185.0;

/// Tonal body plus band-limited noise.
#[derive(Debug, Clone)]
pub struct Snare {
    phase: f32,
    noise: Noise,
    lowpass: TwoPoleLowpass,
    highpass: TwoPoleHighpass,
    sample_rate: f32,
}

impl Snare {
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        Self {
            phase: 0.0,
            noise: Noise::new(seed),
            lowpass: TwoPoleLowpass::new(8000.0, sample_rate),
            highpass: TwoPoleHighpass::new(2000.0, sample_rate),
            sample_rate,
        }
    }

    pub fn trigger(&mut self) {
        self.phase = 0.0;
    }

    #[inline]
    pub fn render(&mut self, frequency: f32) -> f32 {
        let body = sin_phase(self.phase) * 0.4;
        advance_phase(&mut self.phase, frequency / self.sample_rate);

        let snap = self.highpass.process(self.lowpass.process(self.noise.next_sample())) * 0.6;
        soft_clip(body + snap)
    }
}

/// Hi-hat base pitch when the note does not give one.
pub const HIHAT_BASE_FREQ: f32 = 6000.0;

/// Inharmonic partial ratios (the classic 808 metallic cluster).
const HIHAT_RATIOS: [f32; 6] = [1.0, 1.4983, 1.7424, 1.9858, 2.4631, 2.6306];

/// Six detuned pulse waves plus noise, band-passed.
#[derive(Debug, Clone)]
pub struct HiHat {
    phases: [f32; 6],
    noise: Noise,
    highpass: TwoPoleHighpass,
    lowpass: TwoPoleLowpass,
    sample_rate: f32,
}

impl HiHat {
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        Self {
            phases: [0.0; 6],
            noise: Noise::new(seed),
            highpass: TwoPoleHighpass::new(7000.0, sample_rate),
            lowpass: TwoPoleLowpass::new(12000.0, sample_rate),
            sample_rate,
        }
    }

    pub fn trigger(&mut self) {
        self.phases = [0.0; 6];
    }

    #[inline]
    pub fn render(&mut self, frequency: f32) -> f32 {
        let mut metal = 0.0;
        for (i, (phase, ratio)) in self.phases.iter_mut().zip(HIHAT_RATIOS).enumerate() {
            let width = 0.4 + i as f32 * 0.05;
            metal += if *phase < width { 0.5 } else { -0.5 };
            advance_phase(phase, (frequency * ratio / self.sample_rate).min(0.49));
        }
        metal /= HIHAT_RATIOS.len() as f32;

        let mixed = metal * 0.7 + self.noise.next_sample() * 0.3;
        soft_clip(self.lowpass.process(self.highpass.process(mixed)) * 1.5)
    }
}
