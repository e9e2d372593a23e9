use crate::model::{MidiFile, MidiTrack, TempoMap, TempoPoint};
use errata_ports::midi::NoteEvent;
use errata_ports::types::Tick;
use midly::{Fps, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum MidiImportError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

pub fn import_midi_path(path: &Path) -> Result<MidiFile, MidiImportError> {
    let data = std::fs::read(path)
        .map_err(|e| MidiImportError::Io(format!("{}: {}", path.display(), e)))?;
    import_midi_bytes(&data)
}

pub fn import_midi_bytes(data: &[u8]) -> Result<MidiFile, MidiImportError> {
    let smf = Smf::parse(data).map_err(|e| MidiImportError::Parse(e.to_string()))?;
    let (ppq, tempo_override) = match smf.header.timing {
        Timing::Metrical(ticks) => (ticks.as_int(), None),
        Timing::Timecode(fps, ticks_per_frame) => {
            let (ppq, us_per_quarter) = timecode_ppq_and_tempo(fps, ticks_per_frame);
            (ppq, Some(us_per_quarter))
        }
    };
    if ppq == 0 {
        return Err(MidiImportError::Parse("zero ticks per quarter".to_string()));
    }

    let mut tempo_points: BTreeMap<Tick, u32> = BTreeMap::new();
    let mut tracks = Vec::with_capacity(smf.tracks.len());
    let mut dangling_notes = 0usize;

    for (index, track) in smf.tracks.iter().enumerate() {
        let mut tick: Tick = 0;
        let mut name: Option<String> = None;
        let mut pairer = NotePairer::default();

        for event in track {
            tick += event.delta.as_int() as Tick;
            match &event.kind {
                TrackEventKind::Midi { channel, message } => match message {
                    MidiMessage::NoteOn { key, vel } => {
                        if vel.as_int() == 0 {
                            pairer.note_off(tick, channel.as_int(), key.as_int());
                        } else {
                            pairer.note_on(tick, channel.as_int(), key.as_int(), vel.as_int());
                        }
                    }
                    MidiMessage::NoteOff { key, .. } => {
                        pairer.note_off(tick, channel.as_int(), key.as_int());
                    }
                    _ => {}
                },
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter)) => {
                    tempo_points.insert(tick, us_per_quarter.as_int());
                }
                TrackEventKind::Meta(MetaMessage::TrackName(raw)) if name.is_none() => {
                    name = Some(String::from_utf8_lossy(raw).trim().to_string());
                }
                _ => {}
            }
        }

        let (notes, dangling) = pairer.finish(tick);
        dangling_notes += dangling;
        tracks.push(MidiTrack {
            index,
            name: name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("track-{index}")),
            notes,
        });
    }

    let tempo_map = TempoMap::new(ppq, build_tempo_map(tempo_points, tempo_override));

    Ok(MidiFile {
        ppq,
        tempo_map,
        tracks,
        dangling_notes,
    })
}

/// Pairs each note-on with the first later note-off of the same channel and key.
#[derive(Default)]
struct NotePairer {
    notes: Vec<NoteEvent>,
    open: HashMap<(u8, u8), VecDeque<usize>>,
}

impl NotePairer {
    fn note_on(&mut self, tick: Tick, channel: u8, pitch: u8, velocity: u8) {
        self.open
            .entry((channel, pitch))
            .or_default()
            .push_back(self.notes.len());
        self.notes.push(NoteEvent {
            tick,
            pitch,
            duration: 0,
            channel,
            velocity,
        });
    }

    fn note_off(&mut self, tick: Tick, channel: u8, pitch: u8) {
        // orphan note-offs are dropped
        let Some(idx) = self
            .open
            .get_mut(&(channel, pitch))
            .and_then(|queue| queue.pop_front())
        else {
            return;
        };
        let note = &mut self.notes[idx];
        note.duration = tick - note.tick;
    }

    fn finish(mut self, end_tick: Tick) -> (Vec<NoteEvent>, usize) {
        let mut dangling = 0;
        for queue in self.open.values() {
            for &idx in queue {
                let note = &mut self.notes[idx];
                note.duration = (end_tick - note.tick).max(0);
                dangling += 1;
            }
        }
        (self.notes, dangling)
    }
}

fn build_tempo_map(
    tempo_points: BTreeMap<Tick, u32>,
    override_us_per_quarter: Option<u32>,
) -> Vec<TempoPoint> {
    if let Some(us_per_quarter) = override_us_per_quarter {
        return vec![TempoPoint {
            tick: 0,
            us_per_quarter,
        }];
    }

    tempo_points
        .into_iter()
        .map(|(tick, us_per_quarter)| TempoPoint {
            tick,
            us_per_quarter,
        })
        .collect()
}

fn timecode_ppq_and_tempo(fps: Fps, ticks_per_frame: u8) -> (u16, u32) {
    let ticks_per_frame = ticks_per_frame.max(1) as u16;
    match fps {
        Fps::Fps24 => (24 * ticks_per_frame, 1_000_000),
        Fps::Fps25 => (25 * ticks_per_frame, 1_000_000),
        Fps::Fps30 => (30 * ticks_per_frame, 1_000_000),
        Fps::Fps29 => (30 * ticks_per_frame, 1_001_000),
    }
}
