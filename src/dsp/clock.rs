//! Shared audio clock.
//!
//! The engine advances the frame count after every block; any thread can
//! read the current audio time. The generation counter is bumped on stop so
//! the engine can tell stale events from live ones.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct AudioClock {
    frames: AtomicU64,
    generation: AtomicU64,
    sample_rate: f64,
}

impl AudioClock {
    pub fn new(sample_rate: f32) -> Self {
        Self { frames: AtomicU64::new(0), generation: AtomicU64::new(0), sample_rate: sample_rate as f64 }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Frames rendered so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Current audio time in seconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate
    }

    #[inline]
    pub fn advance(&self, frames: usize) {
        self.frames.fetch_add(frames as u64, Ordering::AcqRel);
    }

    /// Nearest frame index for a time in seconds.
    #[inline]
    pub fn frame_at(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate).round() as u64
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new generation, invalidating everything dispatched before. Returns it.
    pub fn invalidate(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}
