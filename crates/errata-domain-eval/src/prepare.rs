use errata_domain_score::TempoMap;
use errata_ports::midi::NoteEvent;
use errata_ports::types::Tick;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CandidateFilter {
    /// Drop notes with a lower note-on velocity.
    pub min_velocity: Option<u8>,
    /// Drop notes that sound for less than this many milliseconds.
    pub min_duration_ms: Option<u32>,
    /// Drop notes further than this many semitones outside the model's range.
    pub pitch_margin: Option<u8>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub velocity: usize,
    pub duration: usize,
    pub pitch_range: usize,
}

impl FilterStats {
    pub fn total(&self) -> usize {
        self.velocity + self.duration + self.pitch_range
    }
}

/// Reorders notes sounding together by ascending pitch so chords compare
/// independently of the order their note-ons were written in.
///
/// A cluster starts at its first note and takes every following note whose
/// onset is at most `spread_ms` later.
pub fn sort_simultaneous(notes: &[NoteEvent], tempo: &TempoMap, spread_ms: u32) -> Vec<NoteEvent> {
    let mut sorted = Vec::with_capacity(notes.len());
    let mut cluster: Vec<NoteEvent> = Vec::new();
    let mut cluster_start_ms = 0.0;

    for note in notes {
        let at_ms = tempo.tick_to_ms(note.tick);
        if !cluster.is_empty() && at_ms - cluster_start_ms > spread_ms as f64 {
            flush_cluster(&mut cluster, &mut sorted);
        }
        if cluster.is_empty() {
            cluster_start_ms = at_ms;
        }
        cluster.push(*note);
    }
    flush_cluster(&mut cluster, &mut sorted);

    sorted
}

fn flush_cluster(cluster: &mut Vec<NoteEvent>, out: &mut Vec<NoteEvent>) {
    cluster.sort_by_key(|n| n.pitch);
    out.append(cluster);
}

/// Splits off notes whose note-on and note-off share a tick.
pub fn drop_zero_duration(notes: Vec<NoteEvent>) -> (Vec<NoteEvent>, usize) {
    let before = notes.len();
    let kept: Vec<NoteEvent> = notes.into_iter().filter(|n| n.duration > 0).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

pub fn filter_candidate(
    candidate: Vec<NoteEvent>,
    tempo: &TempoMap,
    model: &[NoteEvent],
    filter: &CandidateFilter,
) -> (Vec<NoteEvent>, FilterStats) {
    let mut stats = FilterStats::default();
    let range = model
        .iter()
        .map(|n| n.pitch)
        .min()
        .zip(model.iter().map(|n| n.pitch).max());

    let kept = candidate
        .into_iter()
        .filter(|note| {
            let mut keep = true;
            if let Some(min_velocity) = filter.min_velocity {
                if note.velocity < min_velocity {
                    stats.velocity += 1;
                    keep = false;
                }
            }
            if let Some(min_ms) = filter.min_duration_ms {
                let length_ms = tempo.tick_to_ms(note.end_tick()) - tempo.tick_to_ms(note.tick);
                if length_ms < min_ms as f64 {
                    stats.duration += 1;
                    keep = false;
                }
            }
            if let (Some(margin), Some((low, high))) = (filter.pitch_margin, range) {
                let pitch = note.pitch as i16;
                if pitch < low as i16 - margin as i16 || pitch > high as i16 + margin as i16 {
                    stats.pitch_range += 1;
                    keep = false;
                }
            }
            keep
        })
        .collect();

    (kept, stats)
}

/// Coarse mapping of candidate onsets onto the model's tick axis: rescales to
/// the model resolution and lines up the first onsets. With `fit_span` the
/// candidate is also stretched so both streams cover the same span. Local
/// tempo is left to [`TickMap`].
pub fn normalize_ticks(
    candidate: &[NoteEvent],
    candidate_ppq: u16,
    model: &[NoteEvent],
    model_ppq: u16,
    fit_span: bool,
) -> Vec<NoteEvent> {
    let (Some(cand_first), Some(model_first)) = (first_onset(candidate), first_onset(model)) else {
        return candidate.to_vec();
    };

    let mut scale = model_ppq.max(1) as f64 / candidate_ppq.max(1) as f64;
    if fit_span {
        let cand_span = last_onset(candidate).unwrap_or(cand_first) - cand_first;
        let model_span = last_onset(model).unwrap_or(model_first) - model_first;
        if cand_span > 0 && model_span > 0 {
            scale = model_span as f64 / cand_span as f64;
        }
    }

    candidate
        .iter()
        .map(|note| NoteEvent {
            tick: model_first + ((note.tick - cand_first) as f64 * scale).round() as Tick,
            duration: (note.duration as f64 * scale).round() as Tick,
            ..*note
        })
        .collect()
}

/// Largest local tempo ratio accepted between two consecutive anchors.
pub const MAX_LOCAL_STRETCH: f64 = 2.0;

/// Piecewise-linear map from candidate ticks onto model ticks, fitted
/// through onset pairs known to correspond.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickMap {
    anchors: Vec<(Tick, Tick)>,
}

impl TickMap {
    /// Builds the map from `(candidate, model)` onset pairs. Pairs that would
    /// make the map non-increasing, or imply a local tempo change beyond
    /// [`MAX_LOCAL_STRETCH`], are skipped.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Tick, Tick)>) -> Self {
        let mut pairs: Vec<(Tick, Tick)> = pairs.into_iter().collect();
        pairs.sort_unstable();

        let mut anchors: Vec<(Tick, Tick)> = Vec::with_capacity(pairs.len());
        for (cand, model) in pairs {
            let Some(&(last_cand, last_model)) = anchors.last() else {
                anchors.push((cand, model));
                continue;
            };
            if cand <= last_cand || model <= last_model {
                continue;
            }
            let stretch = (model - last_model) as f64 / (cand - last_cand) as f64;
            if (1.0 / MAX_LOCAL_STRETCH..=MAX_LOCAL_STRETCH).contains(&stretch) {
                anchors.push((cand, model));
            }
        }
        Self { anchors }
    }

    pub fn anchors(&self) -> &[(Tick, Tick)] {
        &self.anchors
    }

    /// Interpolates between the surrounding anchors; outside them the
    /// offset of the nearest anchor is kept.
    pub fn map(&self, tick: Tick) -> Tick {
        let Some(&(first_cand, first_model)) = self.anchors.first() else {
            return tick;
        };
        let next = self.anchors.partition_point(|(cand, _)| *cand <= tick);
        if next == 0 {
            return first_model + (tick - first_cand);
        }
        let (c0, m0) = self.anchors[next - 1];
        match self.anchors.get(next) {
            Some(&(c1, m1)) => {
                m0 + ((tick - c0) as f64 * (m1 - m0) as f64 / (c1 - c0) as f64).round() as Tick
            }
            None => m0 + (tick - c0),
        }
    }

    pub fn apply(&self, notes: &[NoteEvent]) -> Vec<NoteEvent> {
        notes
            .iter()
            .map(|note| NoteEvent {
                tick: self.map(note.tick),
                ..*note
            })
            .collect()
    }
}

fn first_onset(notes: &[NoteEvent]) -> Option<Tick> {
    notes.iter().map(|n| n.tick).min()
}

fn last_onset(notes: &[NoteEvent]) -> Option<Tick> {
    notes.iter().map(|n| n.tick).max()
}
