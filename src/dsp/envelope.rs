//! Envelopes: the voice's filter envelope and the per-note exponential ramps.

/// Filter-envelope time constant in seconds (2000 samples at 44.1 kHz).
const FILTER_ENV_TAU: f32 = 2000.0 / 44100.0;
/// Level the filter envelope settles to between notes.
const FILTER_ENV_TARGET: f32 = 0.3;

/// One-pole decay from 1.0 toward a resting level, restarted on every note.
#[derive(Debug, Clone)]
pub struct FilterEnvelope {
    value: f32,
    coeff: f32,
}

impl FilterEnvelope {
    pub fn new(sample_rate: f32) -> Self {
        Self { value: 1.0, coeff: (-1.0 / (FILTER_ENV_TAU * sample_rate)).exp() }
    }

    pub fn trigger(&mut self) {
        self.value = 1.0;
    }

    /// Advance one sample and return the envelope value.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        self.value = self.value * self.coeff + FILTER_ENV_TARGET * (1.0 - self.coeff);
        self.value
    }

    /// Cutoff multiplier in [0.3, 1.0] for the current envelope value.
    #[inline]
    pub fn cutoff_scale(value: f32) -> f32 {
        0.3 + value * 0.7
    }
}

/// Exponential ramp `start → end` over a fixed number of samples, then holds `end`.
///
/// Same curve as an `exponentialRampToValueAtTime` automation.
#[derive(Debug, Clone)]
pub struct ExpRamp {
    value: f32,
    end: f32,
    factor: f32,
    remaining: u32,
}

impl ExpRamp {
    pub fn idle(value: f32) -> Self {
        Self { value, end: value, factor: 1.0, remaining: 0 }
    }

    pub fn new(start: f32, end: f32, seconds: f32, sample_rate: f32) -> Self {
        let samples = (seconds * sample_rate).max(1.0);
        let (start, end) = (start.max(1e-6), end.max(1e-6));
        Self {
            value: start,
            end,
            factor: (end / start).powf(1.0 / samples),
            remaining: samples as u32,
        }
    }

    /// Current value, then advance.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let out = self.value;
        if self.remaining > 0 {
            self.remaining -= 1;
            self.value = if self.remaining == 0 { self.end } else { self.value * self.factor };
        }
        out
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }
}

/// Amplitude floor a decaying note ramps to before it is cut.
const NOTE_FLOOR: f32 = 0.01;

/// Per-note gain: jump to the note level, decay exponentially, then go silent.
///
/// A note without a duration holds its level until the next trigger.
#[derive(Debug, Clone)]
pub struct NoteEnvelope {
    ramp: ExpRamp,
    sounding: bool,
    held: bool,
}

impl NoteEnvelope {
    pub fn new() -> Self {
        Self { ramp: ExpRamp::idle(0.0), sounding: false, held: false }
    }

    pub fn trigger(&mut self, level: f32, duration: Option<f32>, sample_rate: f32) {
        match duration {
            Some(seconds) if level > NOTE_FLOOR => {
                self.ramp = ExpRamp::new(level, NOTE_FLOOR, seconds, sample_rate);
                self.held = false;
            }
            Some(seconds) => {
                // Already below the floor: hold the level for the note length.
                self.ramp = ExpRamp::new(level, level, seconds, sample_rate);
                self.held = false;
            }
            None => {
                self.ramp = ExpRamp::idle(level);
                self.held = true;
            }
        }
        self.sounding = level > 0.0;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if !self.sounding {
            return 0.0;
        }
        let gain = self.ramp.next_sample();
        if !self.held && self.ramp.is_done() {
            self.sounding = false;
        }
        gain
    }

    pub fn is_sounding(&self) -> bool {
        self.sounding
    }
}

impl Default for NoteEnvelope {
    fn default() -> Self {
        Self::new()
    }
}
