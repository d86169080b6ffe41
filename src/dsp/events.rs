//! Trigger events and the lock-free queue that carries them to the audio path.
//!
//! The scheduler thread owns an [`EventSender`], the engine owns the matching
//! [`EventReceiver`]. Both sides are wait-free; a full queue drops the event
//! rather than block the producer.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, ShedError};

/// Which instrument an event plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Synth,
    Kick,
    Snare,
    Hihat,
}

impl InstrumentKind {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "synth" => Ok(InstrumentKind::Synth),
            "kick" => Ok(InstrumentKind::Kick),
            "snare" => Ok(InstrumentKind::Snare),
            "hihat" => Ok(InstrumentKind::Hihat),
            other => Err(ShedError::UnknownInstrument(other.to_string())),
        }
    }

    /// Note length used when an event does not carry one.
    pub fn default_duration(self) -> f32 {
        match self {
            InstrumentKind::Synth => 0.2,
            InstrumentKind::Kick => 0.5,
            InstrumentKind::Snare => 0.2,
            InstrumentKind::Hihat => 0.1,
        }
    }
}

/// A timestamped instruction to start a note.
///
/// In JSON a missing `duration` takes the instrument's default length, and
/// `"duration": null` holds the note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "NoteEventJson")]
pub struct NoteEvent {
    pub instrument: InstrumentKind,
    /// Start time on the audio clock, in seconds.
    pub time: f64,
    /// Peak gain of the note.
    pub level: f32,
    /// Pitch override in Hz. Without it the synth follows the `frequency`
    /// parameter and drums use their own tuning.
    #[serde(default)]
    pub frequency: Option<f32>,
    /// Decay length in seconds. `None` holds the note until the next trigger.
    pub duration: Option<f32>,
    /// Transport generation the event was dispatched under.
    pub generation: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteEventJson {
    instrument: InstrumentKind,
    time: f64,
    level: f32,
    #[serde(default)]
    frequency: Option<f32>,
    /// Outer `None`: field absent. `Some(None)`: explicit `null`.
    #[serde(default, deserialize_with = "present")]
    duration: Option<Option<f32>>,
    #[serde(default)]
    generation: u64,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<f32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f32>::deserialize(deserializer).map(Some)
}

impl From<NoteEventJson> for NoteEvent {
    fn from(json: NoteEventJson) -> Self {
        let event = NoteEvent {
            frequency: json.frequency,
            generation: json.generation,
            ..NoteEvent::new(json.instrument, json.time, json.level)
        };
        match json.duration {
            Some(duration) => event.with_duration(duration),
            None => event,
        }
    }
}

impl NoteEvent {
    pub fn new(instrument: InstrumentKind, time: f64, level: f32) -> Self {
        Self {
            instrument,
            time,
            level,
            frequency: None,
            duration: Some(instrument.default_duration()),
            generation: 0,
        }
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn with_duration(mut self, duration: Option<f32>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}

/// Anything the scheduler can dispatch events into.
pub trait EventSink {
    /// Hand over one event. Returns `false` if it was dropped.
    fn dispatch(&mut self, event: NoteEvent) -> bool;
}

impl EventSink for Vec<NoteEvent> {
    fn dispatch(&mut self, event: NoteEvent) -> bool {
        self.push(event);
        true
    }
}

/// Create a bounded SPSC event queue.
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (producer, consumer) = HeapRb::new(capacity.max(1)).split();
    (EventSender { producer, dropped: 0 }, EventReceiver { consumer })
}

/// Producer half, owned by the scheduler.
pub struct EventSender {
    producer: HeapProd<NoteEvent>,
    dropped: u64,
}

impl EventSender {
    /// Events lost to a full queue so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl EventSink for EventSender {
    #[inline]
    fn dispatch(&mut self, event: NoteEvent) -> bool {
        if self.producer.try_push(event).is_ok() {
            return true;
        }
        self.dropped += 1;
        log::debug!(
            "event queue full (capacity: {}), {:?} at {:.3}s dropped",
            self.producer.capacity(),
            event.instrument,
            event.time
        );
        false
    }
}

/// Consumer half, owned by the audio path.
pub struct EventReceiver {
    consumer: HeapCons<NoteEvent>,
}

impl EventReceiver {
    #[inline]
    pub fn pop(&mut self) -> Option<NoteEvent> {
        self.consumer.try_pop()
    }

    pub fn len(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}
