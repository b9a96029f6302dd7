use std::time::Duration;

use log::warn;
use reacomms_proto::{tag, Command, ImmutableCommandBatch};

use crate::error::Result;
use crate::listeners::{ListenerId, Listeners};
use crate::track::update;
use crate::transport::Transport;

pub type TimeHandler = dyn FnMut(&Timekeeper);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
    Recording,
    RecordPaused,
    Unknown(i64),
}

impl PlayState {
    pub fn from_raw(raw: i64) -> PlayState {
        match raw {
            0 => PlayState::Stopped,
            1 => PlayState::Playing,
            2 => PlayState::Paused,
            5 => PlayState::Recording,
            6 => PlayState::RecordPaused,
            other => PlayState::Unknown(other),
        }
    }

    pub fn is_recording(self) -> bool {
        matches!(self, PlayState::Recording | PlayState::RecordPaused)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            numerator: 4,
            denominator: 4,
        }
    }
}

/// Which groups of values changed in the batch that triggered the last notification.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeChanges {
    pub position: bool,
    pub signature: bool,
    pub state: bool,
}

impl TimeChanges {
    pub fn any(&self) -> bool {
        self.position || self.signature || self.state
    }
}

/// Mirror of the project play position and transport state, fed by `BEATPOS` and `TRANSPORT`
/// rows.
pub struct Timekeeper {
    play_state: PlayState,
    repeat: bool,
    position_seconds: f64,
    full_beat_position: f64,
    measure_count: i64,
    beats_in_measure: f64,
    signature: TimeSignature,
    position_string: String,
    position_string_beats: String,
    last_change: TimeChanges,
    listeners: Listeners<TimeHandler>,
}

impl Timekeeper {
    pub fn new() -> Timekeeper {
        Timekeeper {
            play_state: PlayState::Stopped,
            repeat: false,
            position_seconds: 0.0,
            full_beat_position: 0.0,
            measure_count: 0,
            beats_in_measure: 0.0,
            signature: TimeSignature::default(),
            position_string: String::new(),
            position_string_beats: String::new(),
            last_change: TimeChanges::default(),
            listeners: Listeners::new(),
        }
    }

    pub(crate) fn subscribe(transport: &mut Transport, refresh: Duration) {
        transport.register_recurring(tag::BEATPOS, Some(refresh));
        transport.register_recurring(tag::TRANSPORT, Some(refresh));
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn position_seconds(&self) -> f64 {
        self.position_seconds
    }

    pub fn full_beat_position(&self) -> f64 {
        self.full_beat_position
    }

    pub fn measure_count(&self) -> i64 {
        self.measure_count
    }

    pub fn beats_in_measure(&self) -> f64 {
        self.beats_in_measure
    }

    pub fn signature(&self) -> TimeSignature {
        self.signature
    }

    /// Position as formatted by the remote side, in the project's time unit.
    pub fn position_string(&self) -> &str {
        &self.position_string
    }

    pub fn position_string_beats(&self) -> &str {
        &self.position_string_beats
    }

    pub fn last_change(&self) -> TimeChanges {
        self.last_change
    }

    pub fn register_listener<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&Timekeeper) + 'static,
    {
        self.listeners.register(Box::new(handler))
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    pub(crate) fn reconcile(&mut self, batch: ImmutableCommandBatch<'_>) {
        let mut changes = TimeChanges::default();
        if let Some(row) = batch.tagged(tag::BEATPOS).next() {
            match self.apply_beat_position(row) {
                Ok(beat) => {
                    changes.position |= beat.position;
                    changes.signature |= beat.signature;
                    changes.state |= beat.state;
                }
                Err(err) => warn!("Skipping BEATPOS row: {}", err),
            }
        }
        if let Some(row) = batch.tagged(tag::TRANSPORT).next() {
            match self.apply_transport(row) {
                Ok(transport) => {
                    changes.position |= transport.position;
                    changes.state |= transport.state;
                }
                Err(err) => warn!("Skipping TRANSPORT row: {}", err),
            }
        }
        if changes.any() {
            self.last_change = changes;
            let mut listeners = std::mem::take(&mut self.listeners);
            listeners.notify_with(|handler| handler(self));
            self.listeners = listeners;
        }
    }

    fn apply_beat_position(&mut self, row: Command<'_>) -> Result<TimeChanges> {
        row.require(8)?;
        let play_state = PlayState::from_raw(row.integer(1)?);
        let position_seconds = row.number(2)?;
        let full_beat_position = row.number(3)?;
        let measure_count = row.integer(4)?;
        let beats_in_measure = row.number(5)?;
        let signature = TimeSignature {
            numerator: row.code(6)?,
            denominator: row.code(7)?,
        };

        let mut changes = TimeChanges::default();
        changes.state |= update(&mut self.play_state, &play_state);
        changes.position |= update(&mut self.position_seconds, &position_seconds);
        changes.position |= update(&mut self.full_beat_position, &full_beat_position);
        changes.position |= update(&mut self.measure_count, &measure_count);
        changes.position |= update(&mut self.beats_in_measure, &beats_in_measure);
        changes.signature |= update(&mut self.signature, &signature);
        Ok(changes)
    }

    fn apply_transport(&mut self, row: Command<'_>) -> Result<TimeChanges> {
        row.require(6)?;
        let play_state = PlayState::from_raw(row.integer(1)?);
        let position_seconds = row.number(2)?;
        let repeat = row.integer(3)? != 0;

        let mut changes = TimeChanges::default();
        changes.state |= update(&mut self.play_state, &play_state);
        changes.state |= update(&mut self.repeat, &repeat);
        changes.position |= update(&mut self.position_seconds, &position_seconds);
        changes.position |= update(&mut self.position_string, &row.field(4)?.to_string());
        changes.position |= update(&mut self.position_string_beats, &row.field(5)?.to_string());
        Ok(changes)
    }
}

impl Default for Timekeeper {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Timekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Timekeeper")
            .field("play_state", &self.play_state)
            .field("repeat", &self.repeat)
            .field("position_seconds", &self.position_seconds)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Formats seconds as `h:m:s.mmm` without padding, e.g. `0:1:5.250`.
pub fn seconds_to_hms(seconds: f64) -> String {
    let negative = seconds < 0.0;
    let mut time = seconds.abs();
    let mut hours = 0.0;
    let mut minutes = 0.0;
    if time > 3600.0 {
        hours = (time / 3600.0).floor();
        time -= hours * 3600.0;
    }
    if time > 60.0 {
        minutes = (time / 60.0).floor();
        time -= minutes * 60.0;
    }
    format!(
        "{}{}:{}:{:.3}",
        if negative { "-" } else { "" },
        hours,
        minutes,
        time
    )
}
