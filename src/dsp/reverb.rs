//! Reverb effect: a small Schroeder network.
//!
//! The stereo input is folded to mono and fed through three parallel comb
//! filters. Optionally two series allpasses diffuse the result. The wet
//! signal is added equally to both channels on top of the dry input.

/// A comb filter delay line with feedback.
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
}

impl CombFilter {
    fn new(size: usize, feedback: f32) -> Self {
        Self { buffer: vec![0.0; size.max(1)], index: 0, feedback }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.index];
        self.buffer[self.index] = input + output * self.feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

/// An allpass filter delay line.
#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl AllpassFilter {
    const FEEDBACK: f32 = 0.5;

    fn new(size: usize) -> Self {
        Self { buffer: vec![0.0; size.max(1)], index: 0 }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let bufout = self.buffer[self.index];
        let output = bufout - input;
        self.buffer[self.index] = input + bufout * Self::FEEDBACK;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

// Tuning constants (lengths at 44100 Hz, scaled to the running rate).
const COMB_TUNING: [(usize, f32); 3] = [(2003, 0.8), (2999, 0.75), (4001, 0.7)];
const ALLPASS_TUNING: [usize; 2] = [499, 701];
/// Wet level at `mix == 1`.
const WET_GAIN: f32 = 0.2;

/// The engine's master reverb.
#[derive(Debug, Clone)]
pub struct Reverb {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
    diffusion: bool,
}

impl Reverb {
    /// `diffusion` switches the series allpasses on.
    pub fn new(sample_rate: f32, diffusion: bool) -> Self {
        let scale = sample_rate / 44100.0;
        let combs = COMB_TUNING
            .iter()
            .map(|&(t, fb)| CombFilter::new((t as f32 * scale) as usize, fb))
            .collect();
        let allpasses = ALLPASS_TUNING
            .iter()
            .map(|&t| AllpassFilter::new((t as f32 * scale) as usize))
            .collect();
        Self { combs, allpasses, diffusion }
    }

    /// Process a stereo sample pair. With `mix == 0` the network is bypassed.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32, mix: f32) -> (f32, f32) {
        if mix <= 0.0 {
            return (left, right);
        }
        let input = (left + right) * 0.5;

        let mut verb = 0.0f32;
        for comb in &mut self.combs {
            verb += comb.process(input);
        }
        if self.diffusion {
            for allpass in &mut self.allpasses {
                verb = allpass.process(verb);
            }
        }

        let wet = verb * mix.min(1.0) * WET_GAIN;
        (left + wet, right + wet)
    }

    /// Clear all internal buffers.
    pub fn clear(&mut self) {
        for comb in &mut self.combs {
            comb.clear();
        }
        for allpass in &mut self.allpasses {
            allpass.clear();
        }
    }
}
