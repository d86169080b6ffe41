//! DSP Engine: pure Rust synthesis, effects, scheduling and analysis.
//!
//! Everything on the audio path is allocation-free after construction. The
//! same code runs inside an AudioWorklet (via WASM) and in the offline
//! renderer.

pub mod chorus;
pub mod clock;
pub mod delay;
pub mod effects;
pub mod engine;
pub mod envelope;
pub mod events;
pub mod filter;
pub mod instrument;
pub mod oscillator;
pub mod params;
pub mod percussion;
pub mod renderer;
pub mod reverb;
pub mod scheduler;
pub mod tuner;
pub mod utils;
pub mod voice;
