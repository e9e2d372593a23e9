use errata_domain_eval::{
    align, diff_files, diff_notes, resolve_window, timing_summary, DiffConfig, DiffCosts,
    DiffEntry, DiffError, DiffKind,
};
use errata_domain_score::{MidiFile, MidiTrack, TempoMap};
use errata_ports::midi::NoteEvent;
use errata_ports::storage::OnsetWindow;
use errata_ports::types::StaffId;
use errata_ports::warning::{WarningKind, Warnings};
use pretty_assertions::assert_eq;

fn note(tick: i64, pitch: u8) -> NoteEvent {
    NoteEvent {
        tick,
        pitch,
        duration: 120,
        channel: 0,
        velocity: 90,
    }
}

fn notes(pairs: &[(i64, u8)]) -> Vec<NoteEvent> {
    pairs.iter().map(|(t, p)| note(*t, *p)).collect()
}

fn midi(tracks: Vec<(&str, Vec<NoteEvent>)>) -> MidiFile {
    MidiFile {
        ppq: 480,
        tempo_map: TempoMap::new(480, Vec::new()),
        tracks: tracks
            .into_iter()
            .enumerate()
            .map(|(index, (name, notes))| MidiTrack {
                index,
                name: name.to_string(),
                notes,
            })
            .collect(),
        dangling_notes: 0,
    }
}

const SCALE: &[(i64, u8)] = &[(0, 60), (480, 62), (960, 64)];

#[test]
fn identical_sequences_match_everywhere() {
    let model = notes(SCALE);
    let result = align(&model, &model, Some(240), DiffCosts::default());
    assert_eq!(result.kinds(), vec![DiffKind::Matched; 3]);
    assert_eq!(result.cost, 0);

    let empty = align(&[], &[], Some(240), DiffCosts::default());
    assert!(empty.entries.is_empty());
}

#[test]
fn one_changed_pitch_is_a_single_wrong_pitch() {
    let model = notes(SCALE);
    let candidate = notes(&[(0, 60), (480, 63), (960, 64)]);
    let result = align(&model, &candidate, Some(240), DiffCosts::default());

    assert_eq!(
        result.kinds(),
        vec![DiffKind::Matched, DiffKind::WrongPitch, DiffKind::Matched]
    );
    assert_eq!(result.cost, 3);
}

#[test]
fn dropped_note_is_a_single_missing() {
    let model = notes(SCALE);
    let candidate = notes(&[(0, 60), (960, 64)]);
    let result = align(&model, &candidate, Some(240), DiffCosts::default());

    assert_eq!(
        result.entries,
        vec![
            DiffEntry {
                model: Some(0),
                candidate: Some(0),
                kind: DiffKind::Matched
            },
            DiffEntry {
                model: Some(1),
                candidate: None,
                kind: DiffKind::Missing
            },
            DiffEntry {
                model: Some(2),
                candidate: Some(1),
                kind: DiffKind::Matched
            },
        ]
    );
}

#[test]
fn inserted_note_is_a_single_extra() {
    let model = notes(SCALE);
    let candidate = notes(&[(0, 60), (240, 61), (480, 62), (960, 64)]);
    let result = align(&model, &candidate, Some(240), DiffCosts::default());

    assert_eq!(
        result.kinds(),
        vec![
            DiffKind::Matched,
            DiffKind::Extra,
            DiffKind::Matched,
            DiffKind::Matched
        ]
    );
    assert_eq!(result.entries[1].candidate, Some(1));
    assert_eq!(result.cost, 2);
}

const PHRASE: &[(i64, u8)] = &[(0, 60), (480, 62), (960, 64), (1440, 65)];

fn evenly_spaced(spacings: &[i64]) -> Vec<NoteEvent> {
    let mut tick = 0;
    spacings
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let n = note(tick, 60 + (i % 8) as u8);
            tick += step;
            n
        })
        .collect()
}

#[test]
fn first_note_dropped_is_a_single_missing() {
    let model = notes(PHRASE);
    let candidate = notes(&PHRASE[1..]);
    let result = diff_notes(&model, 480, &candidate, 480, &DiffConfig::default()).expect("diff");

    assert_eq!(
        result.kinds(),
        vec![
            DiffKind::Missing,
            DiffKind::Matched,
            DiffKind::Matched,
            DiffKind::Matched
        ]
    );
    assert_eq!(result.cost, 2);
}

#[test]
fn note_played_before_the_first_is_a_single_extra() {
    let model = notes(PHRASE);
    let candidate = notes(&[(0, 70), (400, 60), (880, 62), (1360, 64), (1840, 65)]);
    let result = diff_notes(&model, 480, &candidate, 480, &DiffConfig::default()).expect("diff");

    assert_eq!(
        result.kinds(),
        vec![
            DiffKind::Extra,
            DiffKind::Matched,
            DiffKind::Matched,
            DiffKind::Matched,
            DiffKind::Matched
        ]
    );
    assert_eq!(result.entries[0].candidate, Some(0));
}

#[test]
fn slower_rendition_matches_without_tempo_normalisation() {
    let model = evenly_spaced(&[480; 16]);
    let candidate = evenly_spaced(&[528; 16]);
    let result = diff_notes(&model, 480, &candidate, 480, &DiffConfig::default()).expect("diff");

    assert_eq!(result.kinds(), vec![DiffKind::Matched; 16]);
}

#[test]
fn tempo_drift_mid_piece_keeps_notes_matched() {
    let model = evenly_spaced(&[480; 16]);
    let mut spacings = vec![480; 8];
    spacings.extend([576; 8]);
    let candidate = evenly_spaced(&spacings);

    let result = diff_notes(&model, 480, &candidate, 480, &DiffConfig::default()).expect("diff");
    assert_eq!(result.kinds(), vec![DiffKind::Matched; 16]);

    let normalized = DiffConfig {
        normalize_tempo: true,
        ..DiffConfig::default()
    };
    let result = diff_notes(&model, 480, &candidate, 480, &normalized).expect("diff");
    assert_eq!(result.kinds(), vec![DiffKind::Matched; 16]);
}

#[test]
fn wrong_note_in_a_slower_rendition_stays_a_wrong_pitch() {
    let model = evenly_spaced(&[480; 16]);
    let mut candidate = evenly_spaced(&[528; 16]);
    candidate[8].pitch += 1;

    let result = diff_notes(&model, 480, &candidate, 480, &DiffConfig::default()).expect("diff");
    assert_eq!(result.count(DiffKind::Matched), 15);
    assert_eq!(result.entries[8].kind, DiffKind::WrongPitch);
    assert_eq!(result.entries[8].model, Some(8));
    assert_eq!(result.entries[8].candidate, Some(8));
}

#[test]
fn first_note_dropped_through_diff_files() {
    let model = midi(vec![("piano", notes(PHRASE))]);
    let candidate = midi(vec![("piano", notes(&[(100, 62), (580, 64), (1060, 65)]))]);
    let mut warnings = Warnings::new();

    let parts = diff_files(&model, &candidate, &[], &DiffConfig::default(), &mut warnings)
        .expect("diff");

    assert_eq!(
        parts[0].result.kinds(),
        vec![
            DiffKind::Missing,
            DiffKind::Matched,
            DiffKind::Matched,
            DiffKind::Matched
        ]
    );
    // candidate ticks stay on the rendition's own axis
    assert_eq!(parts[0].candidate[0].tick, 100);
}

#[test]
fn skipped_and_misplayed_notes_are_told_apart() {
    let model = notes(&[(0, 60), (480, 64), (960, 67)]);
    let candidate = notes(&[(0, 60), (960, 69)]);
    let result = diff_notes(&model, 480, &candidate, 480, &DiffConfig::default()).expect("diff");

    assert_eq!(
        result.entries,
        vec![
            DiffEntry {
                model: Some(0),
                candidate: Some(0),
                kind: DiffKind::Matched
            },
            DiffEntry {
                model: Some(1),
                candidate: None,
                kind: DiffKind::Missing
            },
            DiffEntry {
                model: Some(2),
                candidate: Some(1),
                kind: DiffKind::WrongPitch
            },
        ]
    );
}

#[test]
fn onset_window_policies() {
    let model = notes(&[(0, 60), (480, 62), (720, 64)]);
    assert_eq!(resolve_window(OnsetWindow::Auto { percent: 50 }, &model, 480), Some(120));
    assert_eq!(resolve_window(OnsetWindow::Ticks(30), &model, 480), Some(30));
    assert_eq!(resolve_window(OnsetWindow::Unbounded, &model, 480), None);

    // a lone chord has no interval to measure
    let chord = notes(&[(0, 60), (0, 64)]);
    assert_eq!(resolve_window(OnsetWindow::Auto { percent: 50 }, &chord, 480), Some(60));
}

#[test]
fn unbounded_window_ignores_timing() {
    let model = notes(&[(0, 60), (480, 62)]);
    let candidate = notes(&[(0, 60), (5000, 62)]);

    let strict = DiffConfig {
        window: OnsetWindow::Ticks(10),
        ..DiffConfig::default()
    };
    let result = diff_notes(&model, 480, &candidate, 480, &strict).expect("diff");
    assert_eq!(
        result.kinds(),
        vec![DiffKind::Matched, DiffKind::Extra, DiffKind::Missing]
    );

    let loose = DiffConfig {
        window: OnsetWindow::Unbounded,
        ..DiffConfig::default()
    };
    let result = diff_notes(&model, 480, &candidate, 480, &loose).expect("diff");
    assert_eq!(result.kinds(), vec![DiffKind::Matched; 2]);
}

#[test]
fn invalid_costs_are_rejected() {
    let model = notes(SCALE);
    for costs in [
        DiffCosts {
            gap: 0,
            wrong_pitch: 0,
        },
        DiffCosts {
            gap: 2,
            wrong_pitch: 4,
        },
    ] {
        let cfg = DiffConfig {
            costs,
            ..DiffConfig::default()
        };
        assert!(matches!(
            diff_notes(&model, 480, &model, 480, &cfg),
            Err(DiffError::InvalidConfig(_))
        ));
    }
}

#[test]
fn permuted_chords_match_after_reordering() {
    let model = midi(vec![("piano", notes(&[(0, 60), (0, 64), (0, 67), (480, 72)]))]);
    let candidate = midi(vec![("piano", notes(&[(0, 67), (5, 60), (10, 64), (480, 72)]))]);
    let mut warnings = Warnings::new();

    let parts = diff_files(&model, &candidate, &[], &DiffConfig::default(), &mut warnings)
        .expect("diff");

    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].staff, Some(StaffId::new("piano")));
    assert_eq!(parts[0].result.kinds(), vec![DiffKind::Matched; 4]);

    let unsorted = DiffConfig {
        chord_spread_ms: 0,
        ..DiffConfig::default()
    };
    let parts = diff_files(&model, &candidate, &[], &unsorted, &mut warnings).expect("diff");
    assert_eq!(parts[0].result.count(DiffKind::Matched), 3);
    assert!(warnings.is_empty());
}

#[test]
fn staves_label_their_tracks() {
    let model = midi(vec![
        ("track-0", notes(&[(0, 72)])),
        ("track-1", notes(&[(0, 48)])),
    ]);
    let candidate = midi(vec![
        ("right", notes(&[(0, 72)])),
        ("left", notes(&[(0, 47)])),
    ]);
    let staves = vec![StaffId::new("upper"), StaffId::new("lower")];
    let mut warnings = Warnings::new();

    let parts = diff_files(&model, &candidate, &staves, &DiffConfig::default(), &mut warnings)
        .expect("diff");

    let labels: Vec<Option<StaffId>> = parts.iter().map(|p| p.staff.clone()).collect();
    assert_eq!(labels, vec![Some(StaffId::new("upper")), Some(StaffId::new("lower"))]);
    assert_eq!(parts[1].result.kinds(), vec![DiffKind::WrongPitch]);
}

#[test]
fn differing_track_counts_merge_into_one_part() {
    let model = midi(vec![
        ("upper", notes(&[(0, 72), (480, 74)])),
        ("lower", notes(&[(0, 48)])),
    ]);
    let candidate = midi(vec![("all", notes(&[(0, 48), (0, 72), (480, 74)]))]);
    let mut warnings = Warnings::new();

    let parts = diff_files(&model, &candidate, &[], &DiffConfig::default(), &mut warnings)
        .expect("diff");

    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].staff, None);
    assert_eq!(parts[0].result.kinds(), vec![DiffKind::Matched; 3]);
}

#[test]
fn zero_length_notes_are_dropped_with_a_warning() {
    let model = midi(vec![("piano", notes(SCALE))]);
    let mut blip = note(300, 90);
    blip.duration = 0;
    let mut played = notes(SCALE);
    played.insert(1, blip);
    let candidate = midi(vec![("piano", played)]);
    let mut warnings = Warnings::new();

    let parts = diff_files(&model, &candidate, &[], &DiffConfig::default(), &mut warnings)
        .expect("diff");

    assert_eq!(parts[0].candidate.len(), 3);
    assert_eq!(parts[0].result.kinds(), vec![DiffKind::Matched; 3]);
    assert_eq!(warnings.count(WarningKind::ZeroDuration), 1);
}

#[test]
fn slower_rendition_reports_its_tempo_ratio() {
    let model = midi(vec![("piano", notes(SCALE))]);
    let candidate = midi(vec![("piano", notes(&[(0, 60), (960, 62), (1920, 64)]))]);
    let cfg = DiffConfig {
        normalize_tempo: true,
        ..DiffConfig::default()
    };
    let mut warnings = Warnings::new();

    let parts = diff_files(&model, &candidate, &[], &cfg, &mut warnings).expect("diff");
    assert_eq!(parts[0].result.kinds(), vec![DiffKind::Matched; 3]);

    let timing = timing_summary(&parts, &model.tempo_map, &candidate.tempo_map);
    assert_eq!(timing.tempo_ratio, Some(2.0));
    assert_eq!(timing.mean_onset_error_ms, Some(0.0));
    assert_eq!(timing.matched_pairs, 3);
}
