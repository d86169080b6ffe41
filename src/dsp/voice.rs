//! Synth voice: three detuned oscillators into a ladder filter and chorus.
//!
//! Signal path per sample:
//!
//! ```text
//! osc1 (f) ─┐
//! osc2 (f·+detune) ─┼─ mix ─ + noise ─ ladder(cutoff·filterEnv) ─ tanh(sat) ─ chorus ─ (L, R)
//! osc3 (f·-detune/2) ┘
//! ```
//!
//! All three oscillators share a slow drift LFO that never resets, so a
//! sustained note wanders by a fraction of a cent.

use super::chorus::Chorus;
use super::envelope::FilterEnvelope;
use super::filter::LadderFilter;
use super::oscillator::{Oscillator, Waveform};
use super::params::ParamSnapshot;
use super::utils::{advance_phase, sin_phase, Noise};

/// Drift LFO rate in Hz.
const DRIFT_RATE: f32 = 0.12;
/// Drift depth in cents.
const DRIFT_CENTS: f32 = 0.4;
/// Highest phase increment an oscillator is allowed (cycles/sample).
const MAX_INC: f32 = 0.49;
/// Oscillator mix weights.
const MIX: [f32; 3] = [0.5, 0.35, 0.15];

#[inline]
fn cents_to_ratio(cents: f32) -> f32 {
    (cents / 1200.0).exp2()
}

/// The subtractive synth voice.
#[derive(Debug, Clone)]
pub struct SynthVoice {
    oscillators: [Oscillator; 3],
    drift_phase: f32,
    noise: Noise,
    filter_env: FilterEnvelope,
    filter: LadderFilter,
    chorus: Chorus,
    sample_rate: f32,
}

impl SynthVoice {
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        let mut noise = Noise::new(seed);
        // Start the drift somewhere arbitrary so two voices do not wander in lockstep.
        let drift_phase = (noise.next_sample() + 1.0) * 0.5 % 1.0;
        Self {
            oscillators: [Oscillator::new(), Oscillator::new(), Oscillator::new()],
            drift_phase,
            noise,
            filter_env: FilterEnvelope::new(sample_rate),
            filter: LadderFilter::new(sample_rate),
            chorus: Chorus::new(sample_rate),
            sample_rate,
        }
    }

    /// Start a note: restarts the filter envelope. Oscillator and drift phases run on.
    pub fn trigger(&mut self) {
        self.filter_env.trigger();
    }

    /// Render one stereo frame at `frequency` Hz.
    #[inline]
    pub fn render(&mut self, params: &ParamSnapshot, frequency: f32) -> (f32, f32) {
        advance_phase(&mut self.drift_phase, DRIFT_RATE / self.sample_rate);
        let drift = sin_phase(self.drift_phase) * DRIFT_CENTS;
        let base = frequency * cents_to_ratio(drift) / self.sample_rate;

        let incs = [
            base.min(MAX_INC),
            (base * cents_to_ratio(params.detune)).min(MAX_INC),
            (base * cents_to_ratio(-params.detune * 0.5)).min(MAX_INC),
        ];
        let waveform = Waveform::from_selector(params.waveform);

        let mut value = 0.0;
        for ((osc, inc), weight) in self.oscillators.iter_mut().zip(incs).zip(MIX) {
            value += osc.next_sample(waveform, inc) * weight;
        }
        value += self.noise.next_sample() * params.noise;

        let env = self.filter_env.next_sample();
        let cutoff = params.cutoff * FilterEnvelope::cutoff_scale(env);
        let filtered = self.filter.process(value, cutoff, params.resonance);
        let saturated = (filtered * (1.0 + params.saturation)).tanh();

        self.chorus.process(saturated, params.chorus_mix)
    }

    /// Ladder state resets since the last call.
    pub fn take_filter_resets(&mut self) -> u32 {
        self.filter.take_resets()
    }

    /// Silence all internal state (filter memory and chorus line).
    pub fn clear(&mut self) {
        self.filter.reset();
        self.chorus.clear();
        for osc in &mut self.oscillators {
            osc.reset();
        }
    }
}
