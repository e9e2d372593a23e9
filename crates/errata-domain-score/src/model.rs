use errata_ports::midi::NoteEvent;
use errata_ports::types::{CrossRefKey, PageIndex, Pitch, Rect, StaffId, Tick};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoPoint {
    pub tick: Tick,
    pub us_per_quarter: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TempoMap {
    ppq: u16,
    segments: Vec<TempoSegment>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct TempoSegment {
    start_tick: Tick,
    start_us: i64,
    us_per_quarter: u32,
}

impl TempoMap {
    pub fn new(ppq: u16, mut points: Vec<TempoPoint>) -> Self {
        if points.is_empty() || points[0].tick != 0 {
            points.insert(
                0,
                TempoPoint {
                    tick: 0,
                    us_per_quarter: 500_000,
                },
            );
        }
        points.sort_by_key(|p| p.tick);

        let ppq = ppq.max(1);
        let mut segments = Vec::with_capacity(points.len());
        let mut current_us = 0i64;
        for (idx, point) in points.iter().enumerate() {
            if idx > 0 {
                let prev = &points[idx - 1];
                let delta_ticks = point.tick - prev.tick;
                current_us += ticks_to_us(delta_ticks, prev.us_per_quarter, ppq);
            }
            segments.push(TempoSegment {
                start_tick: point.tick,
                start_us: current_us,
                us_per_quarter: point.us_per_quarter,
            });
        }

        Self { ppq, segments }
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    pub fn tick_to_micros(&self, tick: Tick) -> i64 {
        let seg = self.segment_for_tick(tick);
        let delta_ticks = tick - seg.start_tick;
        seg.start_us + ticks_to_us(delta_ticks, seg.us_per_quarter, self.ppq)
    }

    pub fn tick_to_ms(&self, tick: Tick) -> f64 {
        self.tick_to_micros(tick) as f64 / 1000.0
    }

    fn segment_for_tick(&self, tick: Tick) -> TempoSegment {
        let mut current = self.segments[0];
        for seg in &self.segments {
            if seg.start_tick > tick {
                break;
            }
            current = *seg;
        }
        current
    }
}

fn ticks_to_us(ticks: Tick, us_per_quarter: u32, ppq: u16) -> i64 {
    let ticks = ticks as i128;
    let us_per_quarter = us_per_quarter as i128;
    let ppq = ppq as i128;
    ((ticks * us_per_quarter) / ppq) as i64
}

#[derive(Clone, Debug, PartialEq)]
pub struct MidiTrack {
    pub index: usize,
    pub name: String,
    pub notes: Vec<NoteEvent>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MidiFile {
    pub ppq: u16,
    pub tempo_map: TempoMap,
    pub tracks: Vec<MidiTrack>,
    /// Note-ons that never saw a note-off and were closed at the end of file.
    pub dangling_notes: usize,
}

impl MidiFile {
    pub fn note_tracks(&self) -> impl Iterator<Item = &MidiTrack> {
        self.tracks.iter().filter(|t| !t.notes.is_empty())
    }

    /// All notes of every track, stable-sorted by onset.
    pub fn merged_notes(&self) -> Vec<NoteEvent> {
        let mut notes: Vec<NoteEvent> = self
            .tracks
            .iter()
            .flat_map(|t| t.notes.iter().copied())
            .collect();
        notes.sort_by_key(|n| n.tick);
        notes
    }
}

/// A notated glyph region on one page.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationBox {
    pub page: PageIndex,
    pub rect: Rect,
    pub key: CrossRefKey,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub index: PageIndex,
    pub width: f64,
    pub height: f64,
}

/// One notated note occurrence joined to its MIDI tick and page rectangle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRow {
    pub staff: StaffId,
    pub page: PageIndex,
    pub tick: Tick,
    pub pitch: Pitch,
    pub rect: Rect,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationTable {
    pub pages: Vec<PageSize>,
    pub rows: Vec<CorrelationRow>,
}
