//! Audio Engine: renders blocks of stereo audio from queued trigger events.
//!
//! The engine owns one unit per instrument and the master effects. At the
//! top of every block it drains the event queue into a bounded pending list,
//! then walks the block sample by sample, starting each note on the exact
//! frame its timestamp maps to. Nothing on this path allocates or locks.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;

use super::clock::AudioClock;
use super::effects::EffectsChain;
use super::events::{event_queue, EventReceiver, EventSender, InstrumentKind, NoteEvent};
use super::instrument::InstrumentUnit;
use super::params::{ParamBlock, ParamSanitizer};
use super::percussion::{HiHat, Kick, Snare};
use super::utils::derive_seed;
use super::voice::SynthVoice;

/// The real-time renderer.
pub struct ShedEngine {
    synth: InstrumentUnit<SynthVoice>,
    kick: InstrumentUnit<Kick>,
    snare: InstrumentUnit<Snare>,
    hihat: InstrumentUnit<HiHat>,
    effects: EffectsChain,
    sanitizer: ParamSanitizer,
    events: EventReceiver,
    /// Received events not yet due, ordered by time.
    pending: VecDeque<NoteEvent>,
    pending_capacity: usize,
    clock: Arc<AudioClock>,
    generation: u64,
    /// Set once a filter reset has been reported, cleared after a clean block.
    reset_reported: bool,
    /// Events discarded since the last report: stale generation, pending list full.
    stale: usize,
    overflow: usize,
    dropped: u64,
}

impl ShedEngine {
    /// Build an engine and the sender half of its event queue.
    pub fn new(config: &EngineConfig) -> Result<(Self, EventSender)> {
        config.validate()?;
        let sr = config.sample_rate;
        let (sender, events) = event_queue(config.event_queue_capacity);
        let pending_capacity = config.event_queue_capacity;

        let engine = Self {
            synth: InstrumentUnit::new(SynthVoice::new(sr, config.seed), sr),
            kick: InstrumentUnit::new(Kick::new(sr), sr),
            snare: InstrumentUnit::new(Snare::new(sr, derive_seed(config.seed, 2)), sr),
            hihat: InstrumentUnit::new(HiHat::new(sr, derive_seed(config.seed, 3)), sr),
            effects: EffectsChain::new(sr, config.reverb_diffusion),
            sanitizer: ParamSanitizer::new(),
            events,
            pending: VecDeque::with_capacity(pending_capacity),
            pending_capacity,
            clock: Arc::new(AudioClock::new(sr)),
            generation: 0,
            reset_reported: false,
            stale: 0,
            overflow: 0,
            dropped: 0,
        };
        log::debug!(
            "engine ready: {sr} Hz, queue {}, diffusion {}",
            config.event_queue_capacity,
            config.reverb_diffusion
        );
        Ok((engine, sender))
    }

    /// The clock this engine advances. Share it with the scheduler.
    pub fn clock(&self) -> Arc<AudioClock> {
        Arc::clone(&self.clock)
    }

    /// Schedule an event directly, bypassing the queue. It is stamped with
    /// the current generation.
    pub fn trigger(&mut self, event: NoteEvent) {
        let event = event.with_generation(self.clock.generation());
        self.insert_pending(event);
    }

    /// Events waiting for their start frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Events discarded so far, either stale or over capacity.
    pub fn dropped_events(&self) -> u64 {
        self.dropped
    }

    /// Render one block. The block length is the shorter of the two buffers.
    pub fn process(&mut self, params: &ParamBlock<'_>, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        self.sync_generation();
        self.drain_queue();

        let block_start = self.clock.frames();
        for (i, (out_l, out_r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            self.fire_due(block_start + i as u64);

            let p = self.sanitizer.frame(params, i);
            let (vl, vr) = self.synth.render(&p);
            let (kl, kr) = self.kick.render(&p);
            let (nl, nr) = self.snare.render(&p);
            let (hl, hr) = self.hihat.render(&p);
            let (l, r) = self.effects.process(vl + kl + nl + hl, vr + kr + nr + hr, &p);

            *out_l = if l.is_finite() { l } else { 0.0 };
            *out_r = if r.is_finite() { r } else { 0.0 };
        }

        self.clock.advance(frames);
        self.report_resets();
        self.report_drops();
    }

    /// Drop everything dispatched under an older generation.
    fn sync_generation(&mut self) {
        let current = self.clock.generation();
        if current != self.generation {
            let before = self.pending.len();
            self.pending.retain(|e| e.generation == current);
            let discarded = before - self.pending.len();
            self.stale += discarded;
            self.dropped += discarded as u64;
            self.generation = current;
        }
    }

    fn drain_queue(&mut self) {
        while let Some(event) = self.events.pop() {
            if event.generation != self.generation {
                self.stale += 1;
                self.dropped += 1;
                continue;
            }
            self.insert_pending(event);
        }
    }

    fn insert_pending(&mut self, event: NoteEvent) {
        if self.pending.len() >= self.pending_capacity {
            self.overflow += 1;
            self.dropped += 1;
            return;
        }
        let at = self
            .pending
            .iter()
            .rposition(|e| e.time <= event.time)
            .map_or(0, |i| i + 1);
        self.pending.insert(at, event);
    }

    /// Start every pending note due at or before `frame`. Late events start now.
    #[inline]
    fn fire_due(&mut self, frame: u64) {
        while let Some(event) = self.pending.front() {
            if self.clock.frame_at(event.time) > frame {
                break;
            }
            if let Some(event) = self.pending.pop_front() {
                self.start_note(&event);
            }
        }
    }

    fn start_note(&mut self, event: &NoteEvent) {
        match event.instrument {
            InstrumentKind::Synth => self.synth.trigger(event),
            InstrumentKind::Kick => self.kick.trigger(event),
            InstrumentKind::Snare => self.snare.trigger(event),
            InstrumentKind::Hihat => self.hihat.trigger(event),
        }
    }

    fn report_drops(&mut self) {
        if self.stale > 0 {
            log::debug!("discarded {} stale events from a stopped transport", self.stale);
            self.stale = 0;
        }
        if self.overflow > 0 {
            log::debug!("pending list full, {} events dropped", self.overflow);
            self.overflow = 0;
        }
    }

    fn report_resets(&mut self) {
        let resets = self.synth.take_resets();
        if resets == 0 {
            self.reset_reported = false;
        } else if !self.reset_reported {
            log::warn!("ladder filter state went non-finite, {resets} stage(s) zeroed");
            self.reset_reported = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::events::EventSink;
    use crate::dsp::params::{ParamId, ParamSnapshot};

    const SR: f32 = 44100.0;

    fn engine() -> (ShedEngine, EventSender) {
        ShedEngine::new(&EngineConfig::default()).unwrap()
    }

    fn render(engine: &mut ShedEngine, params: &ParamBlock<'_>, blocks: usize) -> Vec<f32> {
        let mut out = Vec::new();
        let (mut l, mut r) = ([0.0f32; 128], [0.0f32; 128]);
        for _ in 0..blocks {
            engine.process(params, &mut l, &mut r);
            out.extend_from_slice(&l);
        }
        out
    }

    #[test]
    fn silent_without_events() {
        let (mut engine, _tx) = engine();
        let out = render(&mut engine, &ParamBlock::new(), 20);
        assert!(out.iter().all(|&x| x == 0.0));
        assert_eq!(engine.clock().frames(), 20 * 128);
    }

    #[test]
    fn event_fires_on_its_exact_frame() {
        let (mut engine, mut tx) = engine();
        assert!(tx.dispatch(NoteEvent::new(InstrumentKind::Snare, 300.0 / SR as f64, 0.4)));
        let out = render(&mut engine, &ParamBlock::new(), 4);
        assert!(out[..300].iter().all(|&x| x == 0.0), "nothing before the start frame");
        assert!(out[300] != 0.0, "snare should start on frame 300");
    }

    #[test]
    fn late_event_fires_at_block_start() {
        let (mut engine, mut tx) = engine();
        let _ = render(&mut engine, &ParamBlock::new(), 2);
        tx.dispatch(NoteEvent::new(InstrumentKind::Snare, 0.0, 0.4));
        let out = render(&mut engine, &ParamBlock::new(), 1);
        assert!(out[0] != 0.0);
        assert_eq!(engine.pending_len(), 0);
    }

    #[test]
    fn invalidated_events_never_sound() {
        let (mut engine, mut tx) = engine();
        let clock = engine.clock();
        tx.dispatch(NoteEvent::new(InstrumentKind::Kick, 0.01, 0.8));
        let _ = render(&mut engine, &ParamBlock::new(), 1);
        assert_eq!(engine.pending_len(), 1, "event is waiting for its frame");
        tx.dispatch(NoteEvent::new(InstrumentKind::Hihat, 0.02, 0.15));

        clock.invalidate();
        let out = render(&mut engine, &ParamBlock::new(), 40);
        assert!(out.iter().all(|&x| x == 0.0), "stopped transport must stay silent");
        assert_eq!(engine.pending_len(), 0);
    }

    #[test]
    fn events_are_ordered_by_time() {
        let (mut engine, _tx) = engine();
        engine.trigger(NoteEvent::new(InstrumentKind::Kick, 0.5, 0.8));
        engine.trigger(NoteEvent::new(InstrumentKind::Snare, 0.1, 0.4));
        engine.trigger(NoteEvent::new(InstrumentKind::Hihat, 0.3, 0.1));
        let times: Vec<f64> = engine.pending.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0.1, 0.3, 0.5]);
    }

    #[test]
    fn constant_and_per_sample_params_render_identically() {
        let (mut a, _ta) = engine();
        let (mut b, _tb) = engine();
        for e in [&mut a, &mut b] {
            e.trigger(NoteEvent::new(InstrumentKind::Synth, 0.0, 0.5).with_duration(None));
            e.trigger(NoteEvent::new(InstrumentKind::Kick, 0.001, 0.8));
        }
        let cutoff = [1800.0f32; 128];
        let resonance = [0.7f32; 128];
        let constant = ParamBlock::new()
            .constant(ParamId::Cutoff, 1800.0)
            .constant(ParamId::Resonance, 0.7);
        let per_sample = ParamBlock::new()
            .per_sample(ParamId::Cutoff, &cutoff)
            .per_sample(ParamId::Resonance, &resonance);
        assert_eq!(render(&mut a, &constant, 30), render(&mut b, &per_sample, 30));
    }

    #[test]
    fn non_finite_params_keep_output_finite() {
        let (mut engine, _tx) = engine();
        engine.trigger(NoteEvent::new(InstrumentKind::Synth, 0.0, 0.5).with_duration(None));
        let bad = [f32::NAN; 128];
        let block = ParamBlock::new()
            .per_sample(ParamId::Cutoff, &bad)
            .constant(ParamId::Frequency, f32::INFINITY)
            .constant(ParamId::Saturation, f32::NEG_INFINITY);
        let out = render(&mut engine, &block, 20);
        assert!(out.iter().all(|x| x.is_finite()));
        assert!(out.iter().any(|&x| x != 0.0), "defaults should still make sound");
    }

    #[test]
    fn drone_follows_frequency_param() {
        let (mut engine, _tx) = engine();
        engine.trigger(NoteEvent::new(InstrumentKind::Synth, 0.0, 0.5).with_duration(None));
        let p = ParamSnapshot {
            waveform: 0.0,
            detune: 0.0,
            chorus_mix: 0.0,
            reverb_mix: 0.0,
            cutoff: 20000.0,
            resonance: 0.0,
            frequency: 441.0,
            ..ParamSnapshot::default()
        };
        let out = render(&mut engine, &p.as_block(), 200);
        let crossings = out[4000..]
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        let expected = (out.len() - 4000) as f32 / 100.0;
        assert!((crossings as f32 - expected).abs() <= 2.0, "{crossings} vs {expected}");
    }

    #[test]
    fn dropped_events_are_counted() {
        let config = EngineConfig { event_queue_capacity: 2, ..EngineConfig::default() };
        let (mut engine, mut tx) = ShedEngine::new(&config).unwrap();
        for t in [0.1, 0.2, 0.3] {
            engine.trigger(NoteEvent::new(InstrumentKind::Kick, t, 0.8));
        }
        assert_eq!(engine.pending_len(), 2);
        assert_eq!(engine.dropped_events(), 1, "third event overflows the pending list");

        engine.clock().invalidate();
        tx.dispatch(NoteEvent::new(InstrumentKind::Snare, 0.5, 0.4));
        let _ = render(&mut engine, &ParamBlock::new(), 1);
        assert_eq!(engine.pending_len(), 0);
        assert_eq!(engine.dropped_events(), 4, "both pending kicks and the queued snare are stale");
    }
}
