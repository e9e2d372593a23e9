use crate::model::{AnnotationBox, CorrelationRow, CorrelationTable, MidiFile, MidiTrack};
use crate::note_log::{LogEntry, NoteLog};
use crate::page_links::PageLinks;
use errata_ports::midi::NoteEvent;
use errata_ports::types::{CrossRefKey, Pitch, StaffId, Tick};
use errata_ports::warning::{WarningKind, Warnings};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Picks the model track for a staff: a track named like the staff, otherwise
/// the note-bearing track at the staff's position.
pub fn track_for_staff<'a>(model: &'a MidiFile, staff: &StaffId, position: usize) -> Option<&'a MidiTrack> {
    model
        .note_tracks()
        .find(|t| t.name == staff.as_str())
        .or_else(|| model.note_tracks().nth(position))
}

/// Joins note logs, page annotations and the model MIDI into one table.
///
/// Log entries and MIDI onsets are paired by rank: the i-th distinct log tick
/// of a staff takes the tick of the i-th distinct MIDI onset of its track,
/// so the two sources never have to agree on tick units or offsets.
pub fn correlate(
    logs: &[NoteLog],
    links: &PageLinks,
    model: &MidiFile,
    warnings: &mut Warnings,
) -> CorrelationTable {
    let boxes: HashMap<&CrossRefKey, &AnnotationBox> = links.boxes().map(|b| (&b.key, b)).collect();
    let mut used: HashSet<&CrossRefKey> = HashSet::new();
    let mut rows = Vec::new();

    for (position, log) in logs.iter().enumerate() {
        let notes: &[NoteEvent] = match track_for_staff(model, &log.staff, position) {
            Some(track) => {
                debug!(staff = %log.staff, track = %track.name, "correlating staff");
                &track.notes
            }
            None => {
                warnings.push(
                    WarningKind::OnsetCountMismatch,
                    Some(&log.staff),
                    format!("no model track for staff; {} log entries unjoinable", log.entries.len()),
                );
                continue;
            }
        };
        let mut staff_rows = correlate_staff(log, notes, &boxes, &mut used, warnings);
        staff_rows.sort_by(|a, b| a.tick.cmp(&b.tick).then(a.pitch.cmp(&b.pitch)));
        rows.extend(staff_rows);
    }

    let unused: Vec<&AnnotationBox> = links.boxes().filter(|b| !used.contains(&b.key)).collect();
    if !unused.is_empty() {
        let sample: Vec<String> = unused.iter().take(5).map(|b| b.key.to_string()).collect();
        warnings.push(
            WarningKind::UnresolvedCrossReference,
            None,
            format!(
                "{} annotation boxes have no log entry (first: {})",
                unused.len(),
                sample.join(", ")
            ),
        );
    }

    CorrelationTable {
        pages: links.page_sizes(),
        rows,
    }
}

fn correlate_staff<'a>(
    log: &NoteLog,
    notes: &[NoteEvent],
    boxes: &HashMap<&'a CrossRefKey, &'a AnnotationBox>,
    used: &mut HashSet<&'a CrossRefKey>,
    warnings: &mut Warnings,
) -> Vec<CorrelationRow> {
    let log_groups = group_log_entries(&log.entries);
    let midi_groups = group_onsets(notes);
    let mut rows = Vec::with_capacity(log.entries.len());

    for ((_, entries), (&midi_tick, onsets)) in log_groups.iter().zip(midi_groups.iter()) {
        let mut consumed = vec![false; onsets.len()];
        let mut pitches: Vec<Option<Pitch>> = Vec::with_capacity(entries.len());
        for entry in entries {
            let exact = onsets
                .iter()
                .enumerate()
                .position(|(i, n)| !consumed[i] && n.pitch == entry.pitch);
            if let Some(i) = exact {
                consumed[i] = true;
            }
            pitches.push(exact.map(|_| entry.pitch));
        }

        // one mismatched entry against one leftover onset is the same glyph
        let unmatched = pitches.iter().filter(|p| p.is_none()).count();
        let spare: Vec<usize> = (0..onsets.len()).filter(|i| !consumed[*i]).collect();
        for (entry, pitch) in entries.iter().zip(pitches.iter_mut()) {
            if pitch.is_some() {
                continue;
            }
            match spare.as_slice() {
                [i] if unmatched == 1 => {
                    consumed[*i] = true;
                    *pitch = Some(onsets[*i].pitch);
                    warnings.push(
                        WarningKind::ChordPitchMismatch,
                        Some(&log.staff),
                        format!(
                            "log pitch {} at key {} taken as MIDI pitch {} at tick {}",
                            entry.pitch, entry.key, onsets[*i].pitch, midi_tick
                        ),
                    );
                }
                _ => warnings.push(
                    WarningKind::ChordPitchMismatch,
                    Some(&log.staff),
                    format!(
                        "log pitch {} at key {} has no MIDI onset of that pitch at tick {}",
                        entry.pitch, entry.key, midi_tick
                    ),
                ),
            }
        }

        for (entry, pitch) in entries.iter().zip(pitches) {
            let Some((&key, annotation)) = boxes.get_key_value(&entry.key) else {
                warnings.push(
                    WarningKind::UnresolvedCrossReference,
                    Some(&log.staff),
                    format!("log entry {} (pitch {}) has no annotation box", entry.key, entry.pitch),
                );
                continue;
            };
            used.insert(key);
            rows.push(CorrelationRow {
                staff: log.staff.clone(),
                page: annotation.page,
                tick: midi_tick,
                pitch: pitch.unwrap_or(entry.pitch),
                rect: annotation.rect,
            });
        }
        let leftover = consumed.iter().filter(|c| !**c).count();
        if leftover > 0 {
            warnings.push(
                WarningKind::ChordPitchMismatch,
                Some(&log.staff),
                format!("{leftover} MIDI onsets at tick {midi_tick} have no log entry"),
            );
        }
    }

    if log_groups.len() != midi_groups.len() {
        let paired = log_groups.len().min(midi_groups.len());
        let tail_entries: usize = log_groups.values().skip(paired).map(Vec::len).sum();
        let first_midi_tail = midi_groups.keys().nth(paired).copied();
        warnings.push(
            WarningKind::OnsetCountMismatch,
            Some(&log.staff),
            format!(
                "{} log onsets vs {} MIDI onsets; paired the first {}, {} log entries unjoinable{}",
                log_groups.len(),
                midi_groups.len(),
                paired,
                tail_entries,
                first_midi_tail
                    .map(|t| format!(", unmatched MIDI from tick {t}"))
                    .unwrap_or_default()
            ),
        );
    }

    rows
}

/// Entries grouped by symbolic tick; emission order is kept within a group.
fn group_log_entries(entries: &[LogEntry]) -> BTreeMap<Tick, Vec<&LogEntry>> {
    let mut groups: BTreeMap<Tick, Vec<&LogEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.tick).or_default().push(entry);
    }
    groups
}

fn group_onsets(notes: &[NoteEvent]) -> BTreeMap<Tick, Vec<&NoteEvent>> {
    let mut groups: BTreeMap<Tick, Vec<&NoteEvent>> = BTreeMap::new();
    for note in notes {
        groups.entry(note.tick).or_default().push(note);
    }
    groups
}
