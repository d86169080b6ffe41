//! Lookahead scheduler and the transport thread that drives it.
//!
//! The scheduler wakes up periodically, looks a short horizon ahead of the
//! audio clock and dispatches every beat that falls inside it, each stamped
//! with its exact start time. Because dispatch runs ahead of playback, a late
//! wake-up costs nothing as long as it is shorter than the horizon.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, tick, unbounded, Sender};

use crate::config::{EngineConfig, Groove};
use crate::error::Result;

use super::clock::AudioClock;
use super::events::{EventSink, InstrumentKind, NoteEvent};

/// Accepted tempo range in beats per minute.
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;
/// Tempo used until one is set.
pub const DEFAULT_BPM: f64 = 110.0;

const BASS_DURATION: f32 = 0.2;

fn sanitize_bpm(bpm: f64) -> Option<f64> {
    bpm.is_finite().then(|| bpm.clamp(MIN_BPM, MAX_BPM))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TransportState {
    Stopped,
    Running { next_beat_time: f64, beat: u64, generation: u64 },
}

/// Turns a tempo and a groove into timestamped trigger events.
#[derive(Debug, Clone)]
pub struct LookaheadScheduler {
    clock: Arc<AudioClock>,
    state: TransportState,
    bpm: f64,
    groove: Groove,
    lookahead: f64,
    horizon: f64,
    tick_interval: Duration,
    current_beat: Option<u8>,
}

impl LookaheadScheduler {
    pub fn new(clock: Arc<AudioClock>, config: &EngineConfig) -> Self {
        Self {
            clock,
            state: TransportState::Stopped,
            bpm: DEFAULT_BPM,
            groove: Groove::default(),
            lookahead: config.lookahead,
            horizon: config.schedule_horizon,
            tick_interval: Duration::from_millis(config.tick_interval),
            current_beat: None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TransportState::Running { .. })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn groove(&self) -> &Groove {
        &self.groove
    }

    /// How often [`tick`](Self::tick) should be called.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Start time of the next beat to be dispatched.
    pub fn next_beat_time(&self) -> Option<f64> {
        match self.state {
            TransportState::Running { next_beat_time, .. } => Some(next_beat_time),
            TransportState::Stopped => None,
        }
    }

    /// Position within the bar (0..4) of the last dispatched beat.
    pub fn current_beat(&self) -> Option<u8> {
        self.current_beat
    }

    /// Begin dispatching beats at `bpm`, the first one `lookahead` seconds
    /// from now. Returns `false` if already running.
    pub fn start(&mut self, bpm: f64) -> bool {
        let generation = self.clock.generation();
        self.start_under(bpm, generation)
    }

    /// Start under a generation read earlier. If the clock has moved on since,
    /// the next tick sees it and dispatches nothing.
    pub fn start_under(&mut self, bpm: f64, generation: u64) -> bool {
        if self.is_running() {
            return false;
        }
        if let Some(bpm) = sanitize_bpm(bpm) {
            self.bpm = bpm;
        }
        let next_beat_time = self.clock.now() + self.lookahead;
        self.state = TransportState::Running {
            next_beat_time,
            beat: 0,
            generation,
        };
        log::info!("transport started at {:.1} bpm, first beat at {next_beat_time:.3}s", self.bpm);
        true
    }

    /// Stop and invalidate everything already dispatched. Returns `false` if
    /// already stopped.
    pub fn stop(&mut self) -> bool {
        let TransportState::Running { generation, .. } = self.state else {
            return false;
        };
        if self.clock.generation() == generation {
            self.clock.invalidate();
        }
        self.state = TransportState::Stopped;
        self.current_beat = None;
        log::info!("transport stopped");
        true
    }

    /// Change tempo. Beats already dispatched keep their times.
    pub fn set_tempo(&mut self, bpm: f64) {
        match sanitize_bpm(bpm) {
            Some(bpm) => {
                self.bpm = bpm;
                log::info!("tempo set to {bpm:.1} bpm");
            }
            None => log::debug!("ignoring non-finite tempo {bpm}"),
        }
    }

    pub fn set_groove(&mut self, groove: Groove) {
        self.groove = groove;
    }

    /// Dispatch every beat that starts before `now + horizon`. Returns the
    /// number of beats dispatched.
    pub fn tick(&mut self, sink: &mut impl EventSink) -> usize {
        let TransportState::Running { mut next_beat_time, mut beat, generation } = self.state else {
            return 0;
        };
        if self.clock.generation() != generation {
            // Stopped from another thread through the clock.
            self.state = TransportState::Stopped;
            self.current_beat = None;
            return 0;
        }

        let until = self.clock.now() + self.horizon;
        let mut dispatched = 0;
        while next_beat_time < until {
            let beat_length = 60.0 / self.bpm;
            self.dispatch_beat(beat, next_beat_time, beat_length, generation, sink);
            self.current_beat = Some((beat % 4) as u8);
            next_beat_time += beat_length;
            beat += 1;
            dispatched += 1;
        }
        self.state = TransportState::Running { next_beat_time, beat, generation };
        dispatched
    }

    fn dispatch_beat(&self, beat: u64, time: f64, beat_length: f64, generation: u64, sink: &mut impl EventSink) {
        let groove = &self.groove;
        let mut send = |event: NoteEvent| {
            if event.level > 0.0 {
                sink.dispatch(event.with_generation(generation));
            }
        };

        let step = beat % 4;
        if step == 0 {
            send(NoteEvent::new(InstrumentKind::Kick, time, groove.kick));
        }
        if step == 2 {
            send(NoteEvent::new(InstrumentKind::Snare, time, groove.snare));
        }
        send(NoteEvent::new(InstrumentKind::Hihat, time, groove.hihat));
        if step == 0 {
            send(
                NoteEvent::new(InstrumentKind::Synth, time, groove.bass)
                    .with_frequency(groove.root / 4.0)
                    .with_duration(Some(BASS_DURATION)),
            );
        }
        send(NoteEvent::new(InstrumentKind::Hihat, time + beat_length / 2.0, groove.hihat));
    }
}

/// Messages from the control thread to the transport thread.
#[derive(Debug, Clone)]
pub enum TransportCommand {
    /// Tempo, and the clock generation current when `start()` was called.
    Start { bpm: f64, generation: u64 },
    Stop,
    SetTempo(f64),
    SetGroove(Groove),
    Shutdown,
}

const NO_BEAT: u8 = u8::MAX;

/// Runs a [`LookaheadScheduler`] on its own thread.
///
/// The thread wakes on a fixed ticker and on commands; it never creates a
/// timer or thread per note. `stop()` takes effect on the audio path at once
/// through the clock generation, before the thread even sees the command.
pub struct Transport {
    commands: Sender<TransportCommand>,
    clock: Arc<AudioClock>,
    running: AtomicBool,
    beat: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
}

impl Transport {
    /// Run `scheduler` on a new thread, ticking at its configured interval.
    pub fn spawn<S>(mut scheduler: LookaheadScheduler, mut sink: S) -> Result<Self>
    where
        S: EventSink + Send + 'static,
    {
        let (commands, inbox) = unbounded::<TransportCommand>();
        let clock = Arc::clone(&scheduler.clock);
        let beat = Arc::new(AtomicU8::new(NO_BEAT));
        let beat_out = Arc::clone(&beat);
        let interval = scheduler.tick_interval();

        let handle = thread::Builder::new().name("shed-transport".into()).spawn(move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(inbox) -> msg => match msg {
                        Ok(TransportCommand::Start { bpm, generation }) => {
                            scheduler.start_under(bpm, generation);
                            scheduler.tick(&mut sink);
                        }
                        Ok(TransportCommand::Stop) => {
                            scheduler.stop();
                        }
                        Ok(TransportCommand::SetTempo(bpm)) => scheduler.set_tempo(bpm),
                        Ok(TransportCommand::SetGroove(groove)) => scheduler.set_groove(groove),
                        Ok(TransportCommand::Shutdown) | Err(_) => break,
                    },
                    recv(ticker) -> _ => {
                        scheduler.tick(&mut sink);
                    }
                }
                beat_out.store(scheduler.current_beat().unwrap_or(NO_BEAT), Ordering::Relaxed);
            }
            log::debug!("transport thread exiting");
        })?;

        Ok(Self { commands, clock, running: AtomicBool::new(false), beat, handle: Some(handle) })
    }

    fn send(&self, command: TransportCommand) {
        if self.commands.send(command).is_err() {
            log::warn!("transport thread is gone, command dropped");
        }
    }

    pub fn start(&self, bpm: f64) {
        if !self.running.swap(true, Ordering::AcqRel) {
            let generation = self.clock.generation();
            self.send(TransportCommand::Start { bpm, generation });
        }
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            self.clock.invalidate();
            self.send(TransportCommand::Stop);
        }
    }

    pub fn set_tempo(&self, bpm: f64) {
        self.send(TransportCommand::SetTempo(bpm));
    }

    pub fn set_groove(&self, groove: Groove) {
        self.send(TransportCommand::SetGroove(groove));
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Beat lamp: position in the bar of the most recently dispatched beat.
    pub fn current_beat(&self) -> Option<u8> {
        match self.beat.load(Ordering::Relaxed) {
            NO_BEAT => None,
            beat => Some(beat),
        }
    }

    /// Stop the thread and wait for it.
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.commands.send(TransportCommand::Shutdown);
            if handle.join().is_err() {
                log::warn!("transport thread panicked");
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.join();
    }
}

impl EventSink for Sender<NoteEvent> {
    fn dispatch(&mut self, event: NoteEvent) -> bool {
        self.try_send(event).is_ok()
    }
}
