use crate::types::*;
use serde::{Deserialize, Serialize};

/// One sounding note, paired from its note-on and note-off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub tick: Tick,
    pub pitch: Pitch,
    pub duration: Tick,
    /// Used to pair note-on/off only; never compared across files.
    pub channel: u8,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn end_tick(&self) -> Tick {
        self.tick + self.duration
    }
}
