use crate::render::Placement;
use errata_domain_eval::{DiffKind, DiffPart, TimingSummary};
use errata_ports::midi::NoteEvent;
use errata_ports::types::{pitch_name, Pitch, StaffId, Tick};
use errata_ports::warning::{Warning, Warnings};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteRef {
    pub tick: Tick,
    pub pitch: Pitch,
    pub name: String,
}

impl NoteRef {
    fn from_note(note: &NoteEvent) -> Self {
        Self {
            tick: note.tick,
            pitch: note.pitch,
            name: pitch_name(note.pitch),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MistakeRecord {
    pub kind: DiffKind,
    pub staff: Option<StaffId>,
    /// The notated note, absent for extra notes.
    pub expected: Option<NoteRef>,
    /// The played note on the candidate's tick axis, absent for missing notes.
    pub played: Option<NoteRef>,
    pub description: String,
    pub drawn: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeCounts {
    pub matched: usize,
    pub wrong_pitch: usize,
    pub missing: usize,
    pub extra: usize,
}

impl MistakeCounts {
    pub fn mistakes(&self) -> usize {
        self.wrong_pitch + self.missing + self.extra
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MistakeReport {
    pub app: String,
    pub version: String,
    pub counts: MistakeCounts,
    pub timing: TimingSummary,
    pub mistakes: Vec<MistakeRecord>,
    pub warnings: Vec<Warning>,
}

impl MistakeReport {
    pub fn build(
        parts: &[DiffPart],
        placement: &Placement,
        timing: TimingSummary,
        warnings: &Warnings,
    ) -> Self {
        let mut counts = MistakeCounts::default();
        let mut mistakes = Vec::new();

        for (part_idx, part) in parts.iter().enumerate() {
            for (entry_idx, entry) in part.result.entries.iter().enumerate() {
                match entry.kind {
                    DiffKind::Matched => counts.matched += 1,
                    DiffKind::WrongPitch => counts.wrong_pitch += 1,
                    DiffKind::Missing => counts.missing += 1,
                    DiffKind::Extra => counts.extra += 1,
                }
                if !entry.kind.is_mistake() {
                    continue;
                }
                let expected = entry.model.and_then(|i| part.model.get(i)).map(NoteRef::from_note);
                let played = entry
                    .candidate
                    .and_then(|i| part.candidate.get(i))
                    .map(NoteRef::from_note);
                mistakes.push(MistakeRecord {
                    kind: entry.kind,
                    staff: part.staff.clone(),
                    description: describe(entry.kind, expected.as_ref(), played.as_ref()),
                    expected,
                    played,
                    drawn: placement.is_drawn(part_idx, entry_idx),
                });
            }
        }

        Self {
            app: "Errata".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            counts,
            timing,
            mistakes,
            warnings: warnings.iter().cloned().collect(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

fn describe(kind: DiffKind, expected: Option<&NoteRef>, played: Option<&NoteRef>) -> String {
    match (kind, expected, played) {
        (DiffKind::Missing, Some(e), _) => format!("{} at tick {} was not played", e.name, e.tick),
        (DiffKind::WrongPitch, Some(e), Some(p)) => {
            format!("{} at tick {} was played as {}", e.name, e.tick, p.name)
        }
        (DiffKind::Extra, _, Some(p)) => format!("extra {} played at tick {}", p.name, p.tick),
        (kind, _, _) => format!("{kind:?}"),
    }
}
