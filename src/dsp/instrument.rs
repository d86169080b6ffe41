//! Instrument capability and the note-handling unit that wraps it.
//!
//! A generator ([`SynthVoice`], [`Kick`], ...) only knows how to make sound at
//! a given pitch. [`InstrumentUnit`] adds what every playable instrument
//! needs on top: the per-note level envelope, pitch resolution (fixed,
//! parameter-following or swept) and optional DC blocking. The unit is
//! generic over the generator, so the per-sample path has no dispatch.

use super::envelope::{ExpRamp, NoteEnvelope};
use super::events::{InstrumentKind, NoteEvent};
use super::params::{ParamId, ParamSnapshot};
use super::percussion::{HiHat, Kick, Snare, HIHAT_BASE_FREQ, SNARE_BODY_FREQ};
use super::utils::DcBlocker;
use super::voice::SynthVoice;

/// A sound generator that can be triggered and rendered.
pub trait Instrument {
    const KIND: InstrumentKind;
    /// Pitch used when neither the event nor the parameters decide it.
    /// `None` means "follow the `frequency` parameter".
    const DEFAULT_FREQUENCY: Option<f32>;
    /// Drums are DC-blocked and mono.
    const DC_BLOCK: bool;

    /// Restart note-scoped state.
    fn trigger(&mut self);

    /// Render one stereo frame.
    fn render_frame(&mut self, params: &ParamSnapshot, frequency: f32) -> (f32, f32);

    /// Pitch contour of a note starting at `frequency`. Constant by default.
    fn pitch_contour(frequency: f32, _duration: f32, _sample_rate: f32) -> ExpRamp {
        ExpRamp::idle(frequency)
    }

    /// Ladder resets since the last call, for instruments that have one.
    fn take_resets(&mut self) -> u32 {
        0
    }
}

impl Instrument for SynthVoice {
    const KIND: InstrumentKind = InstrumentKind::Synth;
    const DEFAULT_FREQUENCY: Option<f32> = None;
    const DC_BLOCK: bool = false;

    fn trigger(&mut self) {
        SynthVoice::trigger(self);
    }

    #[inline]
    fn render_frame(&mut self, params: &ParamSnapshot, frequency: f32) -> (f32, f32) {
        self.render(params, frequency)
    }

    fn take_resets(&mut self) -> u32 {
        self.take_filter_resets()
    }
}

/// End point of the kick's pitch drop.
const KICK_SWEEP_END: f32 = 0.01;

impl Instrument for Kick {
    const KIND: InstrumentKind = InstrumentKind::Kick;
    const DEFAULT_FREQUENCY: Option<f32> = Some(150.0);
    const DC_BLOCK: bool = true;

    fn trigger(&mut self) {
        Kick::trigger(self);
    }

    #[inline]
    fn render_frame(&mut self, _params: &ParamSnapshot, frequency: f32) -> (f32, f32) {
        let s = self.render(frequency);
        (s, s)
    }

    fn pitch_contour(frequency: f32, duration: f32, sample_rate: f32) -> ExpRamp {
        ExpRamp::new(frequency, KICK_SWEEP_END, duration, sample_rate)
    }
}

impl Instrument for Snare {
    const KIND: InstrumentKind = InstrumentKind::Snare;
    const DEFAULT_FREQUENCY: Option<f32> = Some(SNARE_BODY_FREQ);
    const DC_BLOCK: bool = true;

    fn trigger(&mut self) {
        Snare::trigger(self);
    }

    #[inline]
    fn render_frame(&mut self, _params: &ParamSnapshot, frequency: f32) -> (f32, f32) {
        let s = self.render(frequency);
        (s, s)
    }
}

impl Instrument for HiHat {
    const KIND: InstrumentKind = InstrumentKind::Hihat;
    const DEFAULT_FREQUENCY: Option<f32> = Some(HIHAT_BASE_FREQ);
    const DC_BLOCK: bool = true;

    fn trigger(&mut self) {
        HiHat::trigger(self);
    }

    #[inline]
    fn render_frame(&mut self, _params: &ParamSnapshot, frequency: f32) -> (f32, f32) {
        let s = self.render(frequency);
        (s, s)
    }
}

/// A generator plus its note state.
#[derive(Debug, Clone)]
pub struct InstrumentUnit<I> {
    inner: I,
    envelope: NoteEnvelope,
    /// `None` while the synth follows the `frequency` parameter.
    pitch: Option<ExpRamp>,
    dc: DcBlocker,
    sample_rate: f32,
}

impl<I: Instrument> InstrumentUnit<I> {
    pub fn new(inner: I, sample_rate: f32) -> Self {
        Self {
            inner,
            envelope: NoteEnvelope::new(),
            pitch: I::DEFAULT_FREQUENCY.map(ExpRamp::idle),
            dc: DcBlocker::new(),
            sample_rate,
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        I::KIND
    }

    /// Start a note described by `event`.
    pub fn trigger(&mut self, event: &NoteEvent) {
        let level = if event.level.is_finite() { event.level.max(0.0) } else { 0.0 };
        let duration = event.duration.filter(|d| d.is_finite() && *d > 0.0);
        self.envelope.trigger(level, duration, self.sample_rate);

        let frequency = event.frequency.filter(|f| f.is_finite()).or(I::DEFAULT_FREQUENCY);
        self.pitch = frequency.map(|f| {
            let f = ParamId::Frequency.spec().clamp(f);
            let length = duration.unwrap_or_else(|| I::KIND.default_duration());
            I::pitch_contour(f, length, self.sample_rate)
        });
        self.inner.trigger();
    }

    /// Render one frame scaled by the note envelope.
    #[inline]
    pub fn render(&mut self, params: &ParamSnapshot) -> (f32, f32) {
        let spec = ParamId::Frequency.spec();
        let frequency = match self.pitch.as_mut() {
            Some(ramp) => spec.clamp(ramp.next_sample()),
            None => params.frequency,
        };
        let gain = self.envelope.next_sample();
        let (l, r) = self.inner.render_frame(params, frequency);
        if I::DC_BLOCK {
            let s = self.dc.process(l) * gain;
            (s, s)
        } else {
            (l * gain, r * gain)
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.envelope.is_sounding()
    }

    pub fn take_resets(&mut self) -> u32 {
        self.inner.take_resets()
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_until_triggered() {
        let mut unit = InstrumentUnit::new(Snare::new(44100.0, 1), 44100.0);
        let p = ParamSnapshot::default();
        for _ in 0..100 {
            assert_eq!(unit.render(&p), (0.0, 0.0));
        }
        unit.trigger(&NoteEvent::new(InstrumentKind::Snare, 0.0, 0.4));
        let peak = (0..400).map(|_| unit.render(&p).0.abs()).fold(0.0, f32::max);
        assert!(peak > 0.01, "triggered snare should sound, peak {peak}");
    }

    #[test]
    fn note_ends_after_duration() {
        let sr = 44100.0;
        let mut unit = InstrumentUnit::new(HiHat::new(sr, 2), sr);
        let p = ParamSnapshot::default();
        unit.trigger(&NoteEvent::new(InstrumentKind::Hihat, 0.0, 0.15));
        for _ in 0..(0.1 * sr) as usize + 1 {
            unit.render(&p);
        }
        assert!(!unit.is_sounding());
        assert_eq!(unit.render(&p), (0.0, 0.0));
    }

    #[test]
    fn kick_sweep_stops_at_parameter_floor() {
        let sr = 44100.0;
        let mut ramp = Kick::pitch_contour(150.0, 0.5, sr);
        let spec = ParamId::Frequency.spec();
        let first = spec.clamp(ramp.next_sample());
        let mut last = first;
        for _ in 0..(0.5 * sr) as usize {
            last = spec.clamp(ramp.next_sample());
        }
        assert_eq!(first, 150.0);
        assert_eq!(last, 20.0, "sweep target is clamped to the frequency range");
    }

    #[test]
    fn synth_follows_frequency_param_without_override() {
        let sr = 44100.0;
        let mut a = InstrumentUnit::new(SynthVoice::new(sr, 4), sr);
        let mut b = InstrumentUnit::new(SynthVoice::new(sr, 4), sr);
        let p = ParamSnapshot { frequency: 220.0, ..ParamSnapshot::default() };
        a.trigger(&NoteEvent::new(InstrumentKind::Synth, 0.0, 0.5).with_duration(None));
        b.trigger(
            &NoteEvent::new(InstrumentKind::Synth, 0.0, 0.5)
                .with_duration(None)
                .with_frequency(220.0),
        );
        for _ in 0..512 {
            assert_eq!(a.render(&p), b.render(&p));
        }
    }

    #[test]
    fn held_note_drones() {
        let sr = 44100.0;
        let mut unit = InstrumentUnit::new(SynthVoice::new(sr, 4), sr);
        let p = ParamSnapshot::default();
        unit.trigger(&NoteEvent::new(InstrumentKind::Synth, 0.0, 0.5).with_duration(None));
        for _ in 0..sr as usize {
            unit.render(&p);
        }
        assert!(unit.is_sounding());
    }
}
