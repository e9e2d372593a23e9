use crate::prepare::{
    drop_zero_duration, filter_candidate, normalize_ticks, sort_simultaneous, CandidateFilter,
    TickMap,
};
use errata_domain_score::{track_for_staff, MidiFile, MidiTrack, TempoMap};
use errata_ports::midi::NoteEvent;
use errata_ports::storage::{OnsetWindow, SettingsDto};
use errata_ports::types::{StaffId, Tick};
use errata_ports::warning::{WarningKind, Warnings};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("invalid diff configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffCosts {
    pub gap: u32,
    pub wrong_pitch: u32,
}

impl Default for DiffCosts {
    fn default() -> Self {
        Self {
            gap: 2,
            wrong_pitch: 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffConfig {
    pub window: OnsetWindow,
    pub costs: DiffCosts,
    pub chord_spread_ms: u32,
    pub normalize_tempo: bool,
    pub filter: CandidateFilter,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self::from_settings(&SettingsDto::default())
    }
}

impl DiffConfig {
    pub fn from_settings(settings: &SettingsDto) -> Self {
        Self {
            window: settings.onset_window,
            costs: DiffCosts {
                gap: settings.gap_cost,
                wrong_pitch: settings.wrong_pitch_cost,
            },
            chord_spread_ms: settings.chord_spread_ms,
            normalize_tempo: settings.normalize_tempo,
            filter: CandidateFilter {
                min_velocity: settings.filter_velocity,
                min_duration_ms: settings.filter_duration_ms,
                pitch_margin: settings.filter_pitch_margin,
            },
        }
    }

    pub fn validate(&self) -> Result<(), DiffError> {
        let DiffCosts { gap, wrong_pitch } = self.costs;
        if gap == 0 {
            return Err(DiffError::InvalidConfig("gap cost must be positive".into()));
        }
        // a substitution must stay cheaper than a deletion plus an insertion
        if wrong_pitch as u64 >= 2 * gap as u64 {
            return Err(DiffError::InvalidConfig(format!(
                "wrong-pitch cost {wrong_pitch} must be below twice the gap cost {gap}"
            )));
        }
        if let OnsetWindow::Ticks(ticks) = self.window {
            if ticks < 0 {
                return Err(DiffError::InvalidConfig(format!(
                    "onset window {ticks} must not be negative"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    Matched,
    WrongPitch,
    Missing,
    Extra,
}

impl DiffKind {
    pub fn is_mistake(self) -> bool {
        self != DiffKind::Matched
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub model: Option<usize>,
    pub candidate: Option<usize>,
    pub kind: DiffKind,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub entries: Vec<DiffEntry>,
    pub cost: u64,
}

impl DiffResult {
    pub fn count(&self, kind: DiffKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn mistakes(&self) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter().filter(|e| e.kind.is_mistake())
    }

    pub fn kinds(&self) -> Vec<DiffKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }
}

/// One independently aligned unit. `model` and `candidate` hold the prepared
/// note streams the entry indices refer to; candidate ticks are kept on the
/// candidate's own axis.
#[derive(Clone, Debug, PartialEq)]
pub struct DiffPart {
    pub staff: Option<StaffId>,
    pub model: Vec<NoteEvent>,
    pub candidate: Vec<NoteEvent>,
    pub result: DiffResult,
}

/// Turns an onset-window policy into a tick tolerance. `None` means timing
/// is ignored.
pub fn resolve_window(window: OnsetWindow, model: &[NoteEvent], ppq: u16) -> Option<Tick> {
    match window {
        OnsetWindow::Unbounded => None,
        OnsetWindow::Ticks(ticks) => Some(ticks),
        OnsetWindow::Auto { percent } => {
            let mut onsets: Vec<Tick> = model.iter().map(|n| n.tick).collect();
            onsets.sort_unstable();
            onsets.dedup();
            let shortest = onsets
                .windows(2)
                .map(|w| w[1] - w[0])
                .filter(|d| *d > 0)
                .min()
                .unwrap_or(ppq as Tick / 4);
            Some(shortest * percent as Tick / 100)
        }
    }
}

#[derive(Clone, Copy)]
enum Step {
    Diagonal,
    Missing,
    Extra,
}

/// Global alignment of two note sequences with fixed gap and substitution
/// costs. Substitutions farther apart than `tolerance` ticks are not allowed.
pub fn align(
    model: &[NoteEvent],
    candidate: &[NoteEvent],
    tolerance: Option<Tick>,
    costs: DiffCosts,
) -> DiffResult {
    let n = model.len();
    let m = candidate.len();
    let width = m + 1;
    let gap = costs.gap as u64;

    let substitution = |i: usize, j: usize| -> Option<u64> {
        let (a, b) = (&model[i], &candidate[j]);
        if let Some(tol) = tolerance {
            if (a.tick - b.tick).abs() > tol {
                return None;
            }
        }
        Some(if a.pitch == b.pitch {
            0
        } else {
            costs.wrong_pitch as u64
        })
    };

    let mut score = vec![0u64; (n + 1) * width];
    for j in 1..=m {
        score[j] = j as u64 * gap;
    }
    for i in 1..=n {
        score[i * width] = i as u64 * gap;
        for j in 1..=m {
            let mut best = (score[(i - 1) * width + j] + gap).min(score[i * width + j - 1] + gap);
            if let Some(cost) = substitution(i - 1, j - 1) {
                best = best.min(score[(i - 1) * width + j - 1] + cost);
            }
            score[i * width + j] = best;
        }
    }

    let mut entries = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let here = score[i * width + j];
        let step = if i > 0
            && j > 0
            && substitution(i - 1, j - 1).is_some_and(|c| score[(i - 1) * width + j - 1] + c == here)
        {
            Step::Diagonal
        } else if i > 0 && score[(i - 1) * width + j] + gap == here {
            Step::Missing
        } else {
            Step::Extra
        };

        match step {
            Step::Diagonal => {
                i -= 1;
                j -= 1;
                let kind = if model[i].pitch == candidate[j].pitch {
                    DiffKind::Matched
                } else {
                    DiffKind::WrongPitch
                };
                entries.push(DiffEntry {
                    model: Some(i),
                    candidate: Some(j),
                    kind,
                });
            }
            Step::Missing => {
                i -= 1;
                entries.push(DiffEntry {
                    model: Some(i),
                    candidate: None,
                    kind: DiffKind::Missing,
                });
            }
            Step::Extra => {
                j -= 1;
                entries.push(DiffEntry {
                    model: None,
                    candidate: Some(j),
                    kind: DiffKind::Extra,
                });
            }
        }
    }
    entries.reverse();

    DiffResult {
        entries,
        cost: score[n * width + m],
    }
}

/// Validates the configuration, resolves the onset window against the model
/// and aligns the two prepared streams.
///
/// With a bounded window the streams are aligned twice. A first pass on
/// pitch alone pairs up the notes that agree; those pairs fit a [`TickMap`]
/// that follows the rendition's local tempo, and the final pass measures the
/// window on that mapped axis.
pub fn diff_notes(
    model: &[NoteEvent],
    model_ppq: u16,
    candidate: &[NoteEvent],
    candidate_ppq: u16,
    cfg: &DiffConfig,
) -> Result<DiffResult, DiffError> {
    cfg.validate()?;
    let tolerance = resolve_window(cfg.window, model, model_ppq);
    let rescaled = normalize_ticks(candidate, candidate_ppq, model, model_ppq, cfg.normalize_tempo);

    let Some(tolerance) = tolerance else {
        debug!(model = model.len(), candidate = candidate.len(), "aligning on pitch only");
        return Ok(align(model, &rescaled, None, cfg.costs));
    };

    let pitch_only = align(model, &rescaled, None, cfg.costs);
    let map = anchor_map(model, &rescaled, &pitch_only);
    let mapped = map.apply(&rescaled);
    debug!(
        tolerance,
        anchors = map.anchors().len(),
        model = model.len(),
        candidate = candidate.len(),
        "aligning"
    );
    Ok(align(model, &mapped, Some(tolerance), cfg.costs))
}

fn anchor_map(model: &[NoteEvent], candidate: &[NoteEvent], result: &DiffResult) -> TickMap {
    TickMap::from_pairs(
        result
            .entries
            .iter()
            .filter(|e| e.kind == DiffKind::Matched)
            .filter_map(|e| Some((candidate[e.candidate?].tick, model[e.model?].tick))),
    )
}

/// Splits the two files into diff parts and aligns each one.
///
/// When both files carry the same number of note-bearing tracks the i-th
/// model track is compared with the i-th candidate track, labelled with the
/// staff in `staves` that maps to it (or the track name). Otherwise every
/// track is merged into a single unlabelled part.
pub fn diff_files(
    model: &MidiFile,
    candidate: &MidiFile,
    staves: &[StaffId],
    cfg: &DiffConfig,
    warnings: &mut Warnings,
) -> Result<Vec<DiffPart>, DiffError> {
    cfg.validate()?;

    let model_tracks: Vec<&MidiTrack> = model.note_tracks().collect();
    let candidate_tracks: Vec<&MidiTrack> = candidate.note_tracks().collect();

    let mut parts = Vec::new();
    if !model_tracks.is_empty() && model_tracks.len() == candidate_tracks.len() {
        for (model_track, candidate_track) in model_tracks.iter().zip(&candidate_tracks) {
            let staff = staff_for_track(model, model_track, staves);
            parts.push(diff_part(
                Some(staff),
                &model_track.notes,
                &model.tempo_map,
                &candidate_track.notes,
                &candidate.tempo_map,
                cfg,
                warnings,
            )?);
        }
    } else {
        if model_tracks.len() != candidate_tracks.len() {
            debug!(
                model_tracks = model_tracks.len(),
                candidate_tracks = candidate_tracks.len(),
                "track counts differ, diffing merged streams"
            );
        }
        parts.push(diff_part(
            None,
            &model.merged_notes(),
            &model.tempo_map,
            &candidate.merged_notes(),
            &candidate.tempo_map,
            cfg,
            warnings,
        )?);
    }

    Ok(parts)
}

fn staff_for_track(model: &MidiFile, track: &MidiTrack, staves: &[StaffId]) -> StaffId {
    staves
        .iter()
        .enumerate()
        .find(|(position, staff)| {
            track_for_staff(model, staff, *position).is_some_and(|t| t.index == track.index)
        })
        .map(|(_, staff)| staff.clone())
        .unwrap_or_else(|| StaffId::new(track.name.clone()))
}

fn diff_part(
    staff: Option<StaffId>,
    model: &[NoteEvent],
    model_tempo: &TempoMap,
    candidate: &[NoteEvent],
    candidate_tempo: &TempoMap,
    cfg: &DiffConfig,
    warnings: &mut Warnings,
) -> Result<DiffPart, DiffError> {
    let (model_notes, dropped) = drop_zero_duration(model.to_vec());
    if dropped > 0 {
        warnings.push(
            WarningKind::ZeroDuration,
            staff.as_ref(),
            format!("{dropped} zero-length model notes ignored"),
        );
    }
    let (candidate_notes, dropped) = drop_zero_duration(candidate.to_vec());
    if dropped > 0 {
        warnings.push(
            WarningKind::ZeroDuration,
            staff.as_ref(),
            format!("{dropped} zero-length candidate notes ignored"),
        );
    }

    let model_notes = sort_simultaneous(&model_notes, model_tempo, cfg.chord_spread_ms);
    let (candidate_notes, stats) =
        filter_candidate(candidate_notes, candidate_tempo, &model_notes, &cfg.filter);
    if stats.total() > 0 {
        debug!(
            velocity = stats.velocity,
            duration = stats.duration,
            pitch_range = stats.pitch_range,
            "candidate notes filtered"
        );
    }
    let candidate_notes = sort_simultaneous(&candidate_notes, candidate_tempo, cfg.chord_spread_ms);

    let result = diff_notes(
        &model_notes,
        model_tempo.ppq(),
        &candidate_notes,
        candidate_tempo.ppq(),
        cfg,
    )?;

    Ok(DiffPart {
        staff,
        model: model_notes,
        candidate: candidate_notes,
        result,
    })
}
