//! Engine configuration and groove settings, loadable from JSON.
//!
//! ```json
//! { "sampleRate": 48000, "blockSize": 256, "reverbDiffusion": true }
//! ```
//!
//! Every field is optional and falls back to its default.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShedError};

/// Construction-time settings for the engine, scheduler and tuner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f32,
    /// Frames per render call the host is expected to request.
    pub block_size: usize,
    /// Capacity of the scheduler → audio event ring.
    pub event_queue_capacity: usize,
    /// Delay between `start()` and the first beat, in seconds.
    pub lookahead: f64,
    /// How far ahead of the audio clock the scheduler dispatches, in seconds.
    pub schedule_horizon: f64,
    /// Scheduler wake-up period in milliseconds.
    pub tick_interval: u64,
    /// Pitch analysis window in samples (power of two).
    pub pitch_window: usize,
    /// RMS below which pitch is reported as undetermined.
    pub noise_floor: f32,
    /// Seed for every noise source.
    pub seed: u32,
    /// Route the reverb through its allpass diffusers.
    pub reverb_diffusion: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 128,
            event_queue_capacity: 256,
            lookahead: 0.1,
            schedule_horizon: 0.1,
            tick_interval: 25,
            pitch_window: 2048,
            noise_floor: 0.01,
            seed: 0x5EED_1234,
            reverb_diffusion: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate >= 8000.0) {
            return Err(ShedError::InvalidConfig(format!(
                "sampleRate must be at least 8000 Hz, got {}",
                self.sample_rate
            )));
        }
        if self.block_size == 0 {
            return Err(ShedError::InvalidConfig("blockSize must be positive".into()));
        }
        if self.event_queue_capacity == 0 {
            return Err(ShedError::InvalidConfig("eventQueueCapacity must be positive".into()));
        }
        if !(self.lookahead >= 0.0 && self.schedule_horizon > 0.0) {
            return Err(ShedError::InvalidConfig(
                "lookahead must be non-negative and scheduleHorizon positive".into(),
            ));
        }
        if self.tick_interval == 0 || self.tick_interval as f64 / 1000.0 >= self.schedule_horizon {
            return Err(ShedError::InvalidConfig(format!(
                "tickInterval ({} ms) must be shorter than scheduleHorizon ({} s)",
                self.tick_interval, self.schedule_horizon
            )));
        }
        if !self.pitch_window.is_power_of_two() || self.pitch_window < 256 {
            return Err(ShedError::InvalidConfig(format!(
                "pitchWindow must be a power of two >= 256, got {}",
                self.pitch_window
            )));
        }
        Ok(())
    }

    /// Tick interval as seconds of audio time.
    pub fn tick_seconds(&self) -> f64 {
        self.tick_interval as f64 / 1000.0
    }
}

/// Levels and root note of the built-in beat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Groove {
    /// Root of the bass line in Hz; the bass plays two octaves below it.
    pub root: f32,
    pub kick: f32,
    pub snare: f32,
    pub hihat: f32,
    pub bass: f32,
}

impl Default for Groove {
    fn default() -> Self {
        Self { root: 329.63, kick: 0.8, snare: 0.4, hihat: 0.15, bass: 0.5 }
    }
}
