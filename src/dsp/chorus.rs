//! Chorus effect: mono-in, stereo-out modulated delay for thickening sound.
//!
//! One short ring buffer is read at two LFO-modulated fractional delays.
//! The two LFOs run 90° apart, which spreads the wet signal across the
//! stereo field.

use super::utils::{advance_phase, sin_phase};

/// Ring length in seconds.
const BUFFER_SECONDS: f32 = 0.05;
/// Centre delay in seconds.
const BASE_DELAY: f32 = 0.012;
/// Modulation depth in seconds.
const DEPTH: f32 = 0.003;
/// LFO rate in Hz.
const RATE: f32 = 0.4;
/// Wet level at `mix == 1`.
const WET_GAIN: f32 = 0.6;

/// The voice's stereo chorus.
#[derive(Debug, Clone)]
pub struct Chorus {
    buffer: Vec<f32>,
    write_pos: usize,
    sample_rate: f32,
    lfo_phase: f32,
}

impl Chorus {
    pub fn new(sample_rate: f32) -> Self {
        let buffer_size = (sample_rate * BUFFER_SECONDS).ceil() as usize + 1;
        Self { buffer: vec![0.0; buffer_size], write_pos: 0, sample_rate, lfo_phase: 0.0 }
    }

    /// Read from the delay buffer with fractional (linear interpolation) delay.
    #[inline]
    fn read_interpolated(buffer: &[f32], write_pos: usize, delay_samples: f32) -> f32 {
        let buffer_len = buffer.len();
        let delay_int = delay_samples as usize;
        let frac = delay_samples - delay_int as f32;

        let read_pos_0 = (write_pos + buffer_len - delay_int) % buffer_len;
        let read_pos_1 = if read_pos_0 == 0 { buffer_len - 1 } else { read_pos_0 - 1 };

        let s0 = buffer[read_pos_0];
        let s1 = buffer[read_pos_1];
        s0 + frac * (s1 - s0)
    }

    /// Process one mono sample, returning the stereo pair `dry + wet·mix·0.6`.
    #[inline]
    pub fn process(&mut self, input: f32, mix: f32) -> (f32, f32) {
        let buffer_len = self.buffer.len();
        self.buffer[self.write_pos] = input;

        advance_phase(&mut self.lfo_phase, RATE / self.sample_rate);
        let lfo_l = sin_phase(self.lfo_phase);
        let lfo_r = sin_phase((self.lfo_phase + 0.25) % 1.0);

        let max_delay = (buffer_len - 2) as f32;
        let delay_l = ((BASE_DELAY + DEPTH * lfo_l) * self.sample_rate).clamp(1.0, max_delay);
        let delay_r = ((BASE_DELAY + DEPTH * lfo_r) * self.sample_rate).clamp(1.0, max_delay);

        let wet_l = Self::read_interpolated(&self.buffer, self.write_pos, delay_l);
        let wet_r = Self::read_interpolated(&self.buffer, self.write_pos, delay_r);

        self.write_pos = (self.write_pos + 1) % buffer_len;

        let wet = mix * WET_GAIN;
        (input + wet_l * wet, input + wet_r * wet)
    }

    /// Clear internal buffers.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_dry() {
        let mut chorus = Chorus::new(44100.0);
        for _ in 0..2000 {
            let (l, r) = chorus.process(0.5, 0.0);
            assert!((l - 0.5).abs() < 1e-6);
            assert!((r - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn wet_signal_arrives_after_base_delay() {
        let mut chorus = Chorus::new(44100.0);
        let (l, _) = chorus.process(1.0, 1.0);
        assert!((l - 1.0).abs() < 1e-6, "first sample is dry only");
        let mut heard_echo = false;
        for _ in 0..1500 {
            let (l, _) = chorus.process(0.0, 1.0);
            if l.abs() > 0.05 {
                heard_echo = true;
            }
        }
        assert!(heard_echo, "impulse should come back through the delay");
    }

    #[test]
    fn stereo_spread() {
        let mut chorus = Chorus::new(44100.0);
        let mut found_difference = false;
        for i in 0..44100 {
            let x = (i as f32 * 0.05).sin();
            let (l, r) = chorus.process(x, 1.0);
            if (l - r).abs() > 0.001 {
                found_difference = true;
                break;
            }
        }
        assert!(found_difference, "Chorus should produce stereo difference due to phase offset");
    }
}
