//! Tuner: autocorrelation pitch detection on captured audio.
//!
//! The detector trims the quiet edges of the window, autocorrelates what is
//! left, skips the lag-zero lobe and takes the strongest remaining peak,
//! refined by parabolic interpolation. The result is reported as the
//! nearest equal-tempered note plus a cents offset.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use serde::Serialize;

use crate::config::EngineConfig;

/// Note names by pitch class, C first.
pub const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Edge samples below this magnitude are trimmed before correlating.
const TRIM_THRESHOLD: f32 = 0.2;
const A4_FREQ: f64 = 440.0;
const A4_MIDI: f64 = 69.0;

/// A detected pitch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchReading {
    /// Nearest note name, e.g. `"A"` or `"F#"`.
    pub note: &'static str,
    pub octave: i32,
    /// Offset from the nearest note in cents, in [-50, 50].
    pub cents: i32,
    /// Estimated fundamental in Hz.
    pub frequency: f64,
    pub midi_note: i32,
}

impl PitchReading {
    pub fn from_frequency(frequency: f64) -> Option<Self> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return None;
        }
        let midi_float = A4_MIDI + 12.0 * (frequency / A4_FREQ).log2();
        let midi_note = midi_float.round() as i32;
        let cents = ((midi_float - midi_note as f64) * 100.0).round() as i32;
        Some(Self {
            note: NOTE_NAMES[midi_note.rem_euclid(12) as usize],
            octave: midi_note.div_euclid(12) - 1,
            cents,
            frequency,
            midi_note,
        })
    }
}

/// Autocorrelation detector with a pre-sized correlation buffer.
///
/// Windows longer than the configured size are analysed on their most
/// recent `window` samples.
#[derive(Debug, Clone)]
pub struct PitchDetector {
    correlation: Vec<f64>,
    noise_floor: f32,
}

impl PitchDetector {
    pub fn new(window: usize, noise_floor: f32) -> Self {
        Self { correlation: vec![0.0; window.max(2)], noise_floor }
    }

    pub fn window(&self) -> usize {
        self.correlation.len()
    }

    /// Estimate the pitch of `buffer`, or `None` when it is too quiet or has no clear period.
    pub fn detect(&mut self, buffer: &[f32], sample_rate: f32) -> Option<PitchReading> {
        let start = buffer.len().saturating_sub(self.correlation.len());
        let buffer = &buffer[start..];
        let size = buffer.len();
        if size < 4 || !(sample_rate > 0.0) {
            return None;
        }

        let rms = (buffer.iter().map(|&x| (x as f64).powi(2)).sum::<f64>() / size as f64).sqrt();
        if !(rms >= self.noise_floor as f64) {
            return None;
        }

        let half = size / 2;
        let r1 = (0..half).find(|&i| buffer[i].abs() < TRIM_THRESHOLD).unwrap_or(0);
        let r2 = (1..half)
            .find(|&i| buffer[size - i].abs() < TRIM_THRESHOLD)
            .map_or(size - 1, |i| size - i);
        if r2 <= r1 + 3 {
            return None;
        }
        let trimmed = &buffer[r1..r2];
        let n = trimmed.len();

        let c = &mut self.correlation[..n];
        for (lag, slot) in c.iter_mut().enumerate() {
            *slot = trimmed[..n - lag]
                .iter()
                .zip(&trimmed[lag..])
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum();
        }

        // Walk down the lag-zero lobe, then take the highest peak after it.
        let mut d = 0;
        while d + 1 < n && c[d] > c[d + 1] {
            d += 1;
        }
        let mut max_pos = d;
        for i in d..n {
            if c[i] > c[max_pos] {
                max_pos = i;
            }
        }
        if max_pos == 0 || max_pos + 1 >= n {
            return None;
        }

        let (x1, x2, x3) = (c[max_pos - 1], c[max_pos], c[max_pos + 1]);
        let a = (x1 + x3 - 2.0 * x2) / 2.0;
        let b = (x3 - x1) / 2.0;
        let period = if a != 0.0 { max_pos as f64 - b / (2.0 * a) } else { max_pos as f64 };

        PitchReading::from_frequency(sample_rate as f64 / period)
    }
}

/// One-shot detection with the default floor of 0.01 RMS.
pub fn detect_pitch(buffer: &[f32], sample_rate: f32) -> Option<PitchReading> {
    PitchDetector::new(buffer.len(), 0.01).detect(buffer, sample_rate)
}

/// Audio-input side of a capture ring.
pub struct CaptureSender {
    producer: HeapProd<f32>,
}

impl CaptureSender {
    /// Push as many samples as fit; returns how many were written.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }
}

/// Keeps a rolling window of captured audio and reports its pitch.
pub struct PitchTracker {
    capture: HeapCons<f32>,
    history: Vec<f32>,
    scratch: Vec<f32>,
    write: usize,
    filled: usize,
    detector: PitchDetector,
    sample_rate: f32,
}

impl PitchTracker {
    /// Create a tracker and the sender for the capture thread.
    pub fn new(window: usize, noise_floor: f32, sample_rate: f32) -> (CaptureSender, Self) {
        let window = window.max(2);
        let (producer, capture) = HeapRb::new(window * 4).split();
        let tracker = Self {
            capture,
            history: vec![0.0; window],
            scratch: vec![0.0; window],
            write: 0,
            filled: 0,
            detector: PitchDetector::new(window, noise_floor),
            sample_rate,
        };
        (CaptureSender { producer }, tracker)
    }

    /// Tracker sized by `pitchWindow`, gated by `noiseFloor` at the engine rate.
    pub fn from_config(config: &EngineConfig) -> (CaptureSender, Self) {
        Self::new(config.pitch_window, config.noise_floor, config.sample_rate)
    }

    pub fn window(&self) -> usize {
        self.history.len()
    }

    /// Samples waiting in the capture ring.
    pub fn backlog(&self) -> usize {
        self.capture.occupied_len()
    }

    /// Drain the capture ring and analyse the latest full window.
    ///
    /// Returns `None` until a whole window has been captured.
    pub fn poll(&mut self) -> Option<PitchReading> {
        let len = self.history.len();
        while let Some(sample) = self.capture.try_pop() {
            self.history[self.write] = sample;
            self.write = (self.write + 1) % len;
            self.filled = (self.filled + 1).min(len);
        }
        if self.filled < len {
            return None;
        }
        let (older, newer) = self.history.split_at(self.write);
        self.scratch[..newer.len()].copy_from_slice(newer);
        self.scratch[newer.len()..].copy_from_slice(older);
        self.detector.detect(&self.scratch, self.sample_rate)
    }
}
