//! Control parameters: descriptors, per-block inputs and sanitising.
//!
//! The host hands the engine a [`ParamBlock`] per render call. Each entry is
//! either one value for the whole block or one value per sample. The
//! [`ParamSanitizer`] turns that into a clamped [`ParamSnapshot`] per sample,
//! replacing non-finite values with the last good one.

use serde::{Deserialize, Serialize};

/// Identifies one control parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamId {
    Frequency,
    Cutoff,
    Resonance,
    Waveform,
    Detune,
    Noise,
    Saturation,
    ChorusMix,
    Drive,
    DelayTime,
    DelayFeedback,
    DelayMix,
    ReverbMix,
}

pub const PARAM_COUNT: usize = 13;

/// Name, default and range of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: &'static str,
    pub default_value: f32,
    pub min_value: f32,
    pub max_value: f32,
}

impl ParamSpec {
    const fn new(name: &'static str, default_value: f32, min_value: f32, max_value: f32) -> Self {
        Self { name, default_value, min_value, max_value }
    }

    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min_value, self.max_value)
    }
}

/// Descriptor table, indexed by `ParamId as usize`.
pub const PARAM_SPECS: [ParamSpec; PARAM_COUNT] = [
    ParamSpec::new("frequency", 440.0, 20.0, 20000.0),
    ParamSpec::new("cutoff", 1000.0, 20.0, 20000.0),
    ParamSpec::new("resonance", 0.5, 0.0, 0.92),
    ParamSpec::new("waveform", 1.0, 0.0, 3.0),
    ParamSpec::new("detune", 10.0, 0.0, 100.0),
    ParamSpec::new("noise", 0.0, 0.0, 1.0),
    ParamSpec::new("saturation", 0.5, 0.0, 2.0),
    ParamSpec::new("chorusMix", 0.3, 0.0, 1.0),
    ParamSpec::new("drive", 0.0, 0.0, 1.0),
    ParamSpec::new("delayTime", 0.3, 0.0, 1.0),
    ParamSpec::new("delayFeedback", 0.4, 0.0, 0.95),
    ParamSpec::new("delayMix", 0.0, 0.0, 1.0),
    ParamSpec::new("reverbMix", 0.2, 0.0, 1.0),
];

impl ParamId {
    pub const ALL: [ParamId; PARAM_COUNT] = [
        ParamId::Frequency,
        ParamId::Cutoff,
        ParamId::Resonance,
        ParamId::Waveform,
        ParamId::Detune,
        ParamId::Noise,
        ParamId::Saturation,
        ParamId::ChorusMix,
        ParamId::Drive,
        ParamId::DelayTime,
        ParamId::DelayFeedback,
        ParamId::DelayMix,
        ParamId::ReverbMix,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn spec(self) -> &'static ParamSpec {
        &PARAM_SPECS[self.index()]
    }

    /// Look a parameter up by its descriptor name (e.g. `"chorusMix"`).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.spec().name == name)
    }
}

/// One resolved value for every parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamSnapshot {
    pub frequency: f32,
    pub cutoff: f32,
    pub resonance: f32,
    pub waveform: f32,
    pub detune: f32,
    pub noise: f32,
    pub saturation: f32,
    pub chorus_mix: f32,
    pub drive: f32,
    pub delay_time: f32,
    pub delay_feedback: f32,
    pub delay_mix: f32,
    pub reverb_mix: f32,
}

impl ParamSnapshot {
    fn from_values(v: &[f32; PARAM_COUNT]) -> Self {
        Self {
            frequency: v[0],
            cutoff: v[1],
            resonance: v[2],
            waveform: v[3],
            detune: v[4],
            noise: v[5],
            saturation: v[6],
            chorus_mix: v[7],
            drive: v[8],
            delay_time: v[9],
            delay_feedback: v[10],
            delay_mix: v[11],
            reverb_mix: v[12],
        }
    }

    pub fn values(&self) -> [f32; PARAM_COUNT] {
        [
            self.frequency,
            self.cutoff,
            self.resonance,
            self.waveform,
            self.detune,
            self.noise,
            self.saturation,
            self.chorus_mix,
            self.drive,
            self.delay_time,
            self.delay_feedback,
            self.delay_mix,
            self.reverb_mix,
        ]
    }

    pub fn get(&self, id: ParamId) -> f32 {
        self.values()[id.index()]
    }

    /// Every value as a block-constant input.
    pub fn as_block(&self) -> ParamBlock<'static> {
        let mut block = ParamBlock::new();
        for (id, value) in ParamId::ALL.into_iter().zip(self.values()) {
            block.set(id, ParamInput::Constant(value));
        }
        block
    }
}

impl Default for ParamSnapshot {
    fn default() -> Self {
        Self::from_values(&PARAM_SPECS.map(|s| s.default_value))
    }
}

/// How one parameter is supplied for a render call.
#[derive(Debug, Clone, Copy)]
pub enum ParamInput<'a> {
    /// One value for the whole block.
    Constant(f32),
    /// One value per sample. A slice shorter than the block repeats its last value.
    PerSample(&'a [f32]),
}

impl ParamInput<'_> {
    #[inline]
    fn at(&self, index: usize) -> f32 {
        match self {
            ParamInput::Constant(v) => *v,
            ParamInput::PerSample(values) => match values.get(index).or(values.last()) {
                Some(v) => *v,
                None => f32::NAN,
            },
        }
    }
}

/// Parameter inputs for one block. Unset parameters keep their last value.
#[derive(Debug, Clone, Copy)]
pub struct ParamBlock<'a> {
    inputs: [Option<ParamInput<'a>>; PARAM_COUNT],
}

impl<'a> ParamBlock<'a> {
    pub fn new() -> Self {
        Self { inputs: [None; PARAM_COUNT] }
    }

    pub fn set(&mut self, id: ParamId, input: ParamInput<'a>) -> &mut Self {
        self.inputs[id.index()] = Some(input);
        self
    }

    pub fn constant(mut self, id: ParamId, value: f32) -> Self {
        self.set(id, ParamInput::Constant(value));
        self
    }

    pub fn per_sample(mut self, id: ParamId, values: &'a [f32]) -> Self {
        self.set(id, ParamInput::PerSample(values));
        self
    }
}

impl Default for ParamBlock<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamps incoming values and remembers the last finite value of each parameter.
#[derive(Debug, Clone)]
pub struct ParamSanitizer {
    last_good: [f32; PARAM_COUNT],
}

impl ParamSanitizer {
    pub fn new() -> Self {
        Self { last_good: PARAM_SPECS.map(|s| s.default_value) }
    }

    /// Resolve the snapshot for sample `index` of the block.
    #[inline]
    pub fn frame(&mut self, block: &ParamBlock<'_>, index: usize) -> ParamSnapshot {
        for (slot, (input, spec)) in block.inputs.iter().zip(PARAM_SPECS.iter()).enumerate() {
            if let Some(input) = input {
                let raw = input.at(index);
                if raw.is_finite() {
                    self.last_good[slot] = spec.clamp(raw);
                }
            }
        }
        ParamSnapshot::from_values(&self.last_good)
    }
}

impl Default for ParamSanitizer {
    fn default() -> Self {
        Self::new()
    }
}
