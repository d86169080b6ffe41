pub mod config;
pub mod dsp;
pub mod error;

pub use config::{EngineConfig, Groove};
pub use error::ShedError;

use crate::dsp::engine::ShedEngine;
use crate::dsp::events::{EventSender, EventSink, InstrumentKind, NoteEvent};
use crate::dsp::params::{ParamBlock, ParamId, ParamInput, ParamSnapshot, PARAM_COUNT, PARAM_SPECS};
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the shed_dsp version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: parameter descriptors (`name`, `defaultValue`, `minValue`, `maxValue`).
#[wasm_bindgen]
pub fn param_descriptors() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&PARAM_SPECS[..]).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: detect the pitch of a mono buffer. Returns `null` when undetermined.
#[wasm_bindgen]
pub fn detect_pitch(samples: &[f32], sample_rate: f32) -> Result<JsValue, JsValue> {
    match dsp::tuner::detect_pitch(samples, sample_rate) {
        Some(reading) => {
            serde_wasm_bindgen::to_value(&reading).map_err(|e| JsValue::from_str(&format!("{e}")))
        }
        None => Ok(JsValue::NULL),
    }
}

/// WASM-exposed: render the default groove to a WAV byte array.
#[wasm_bindgen]
pub fn render_groove_wav(bpm: f64, seconds: f64, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
    let config = EngineConfig { sample_rate: sample_rate as f32, ..EngineConfig::default() };
    dsp::renderer::render_groove_wav(&config, Groove::default(), bpm, seconds)
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed engine for an AudioWorklet: parameters are block constants
/// set from the main thread, notes are triggered immediately or scheduled.
#[wasm_bindgen]
pub struct ShedProcessor {
    engine: ShedEngine,
    events: EventSender,
    values: [f32; PARAM_COUNT],
}

#[wasm_bindgen]
impl ShedProcessor {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f32) -> Result<ShedProcessor, JsValue> {
        let config = EngineConfig { sample_rate, ..EngineConfig::default() };
        Self::with_config(&config).map_err(|e| JsValue::from_str(&format!("{e}")))
    }

    /// Build from a JSON `EngineConfig`.
    pub fn from_config(json: &str) -> Result<ShedProcessor, JsValue> {
        EngineConfig::from_json(json)
            .and_then(|config| Self::with_config(&config))
            .map_err(|e| JsValue::from_str(&format!("{e}")))
    }

    pub fn set_param(&mut self, name: &str, value: f32) -> Result<(), JsValue> {
        let id = ParamId::from_name(name)
            .ok_or_else(|| JsValue::from_str(&format!("{}", ShedError::UnknownParam(name.to_string()))))?;
        self.values[id.index()] = value;
        Ok(())
    }

    /// Start a note on the next rendered frame. `duration` of `undefined` holds it.
    pub fn trigger(
        &mut self,
        instrument: &str,
        level: f32,
        frequency: Option<f32>,
        duration: Option<f32>,
    ) -> Result<(), JsValue> {
        let event = self.note(instrument, self.current_time(), level, frequency)?.with_duration(duration);
        self.engine.trigger(event);
        Ok(())
    }

    /// Queue a note at `time` seconds on the audio clock. Returns `false` if the queue is full.
    pub fn schedule(
        &mut self,
        instrument: &str,
        time: f64,
        level: f32,
        frequency: Option<f32>,
    ) -> Result<bool, JsValue> {
        let event = self
            .note(instrument, time, level, frequency)?
            .with_generation(self.engine.clock().generation());
        Ok(self.events.dispatch(event))
    }

    /// Drop everything scheduled or pending.
    pub fn cancel_scheduled(&mut self) {
        self.engine.clock().invalidate();
    }

    /// Render one block into the two channel buffers.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let mut block = ParamBlock::new();
        for (id, &value) in ParamId::ALL.iter().zip(&self.values) {
            block.set(*id, ParamInput::Constant(value));
        }
        self.engine.process(&block, left, right);
    }

    /// Audio time in seconds.
    pub fn current_time(&self) -> f64 {
        self.engine.clock().now()
    }
}

impl ShedProcessor {
    pub fn with_config(config: &EngineConfig) -> error::Result<Self> {
        let (engine, events) = ShedEngine::new(config)?;
        Ok(Self { engine, events, values: ParamSnapshot::default().values() })
    }

    fn note(&self, instrument: &str, time: f64, level: f32, frequency: Option<f32>) -> Result<NoteEvent, JsValue> {
        let kind = InstrumentKind::from_name(instrument).map_err(|e| JsValue::from_str(&format!("{e}")))?;
        let mut event = NoteEvent::new(kind, time, level);
        event.frequency = frequency;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn processor_renders_triggered_notes() {
        let mut p = ShedProcessor::with_config(&EngineConfig::default()).unwrap();
        let (mut l, mut r) = ([0.0f32; 128], [0.0f32; 128]);
        p.process(&mut l, &mut r);
        assert!(l.iter().all(|&x| x == 0.0));

        p.engine.trigger(NoteEvent::new(InstrumentKind::Snare, p.current_time(), 0.4));
        p.process(&mut l, &mut r);
        assert!(l.iter().any(|&x| x != 0.0));
        assert!((p.current_time() - 256.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn processor_params_are_sanitised() {
        let mut p = ShedProcessor::with_config(&EngineConfig::default()).unwrap();
        p.values[ParamId::Cutoff.index()] = f32::NAN;
        p.values[ParamId::Resonance.index()] = 10.0;
        p.engine.trigger(NoteEvent::new(InstrumentKind::Synth, 0.0, 0.5).with_duration(None));
        let (mut l, mut r) = ([0.0f32; 128], [0.0f32; 128]);
        for _ in 0..50 {
            p.process(&mut l, &mut r);
            assert!(l.iter().chain(r.iter()).all(|x| x.is_finite()));
        }
    }
}
