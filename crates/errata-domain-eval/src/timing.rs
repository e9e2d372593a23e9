use crate::diff::{DiffKind, DiffPart};
use errata_domain_score::TempoMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    /// Candidate span over model span of the matched onsets, in wall time.
    pub tempo_ratio: Option<f64>,
    /// Mean absolute onset error after anchoring the first matched pair and
    /// undoing the tempo ratio.
    pub mean_onset_error_ms: Option<f64>,
    pub matched_pairs: usize,
}

pub fn timing_summary(parts: &[DiffPart], model_tempo: &TempoMap, candidate_tempo: &TempoMap) -> TimingSummary {
    let mut pairs: Vec<(f64, f64)> = parts
        .iter()
        .flat_map(|part| {
            part.result
                .entries
                .iter()
                .filter(|e| e.kind == DiffKind::Matched)
                .filter_map(move |e| {
                    let model = part.model.get(e.model?)?;
                    let candidate = part.candidate.get(e.candidate?)?;
                    Some((
                        model_tempo.tick_to_ms(model.tick),
                        candidate_tempo.tick_to_ms(candidate.tick),
                    ))
                })
        })
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let Some(&(model_first, candidate_first)) = pairs.first() else {
        return TimingSummary::default();
    };
    let (model_last, candidate_last) = pairs[pairs.len() - 1];

    let model_span = model_last - model_first;
    let candidate_span = candidate_last - candidate_first;
    let tempo_ratio = (model_span > 0.0 && candidate_span > 0.0).then(|| candidate_span / model_span);

    let ratio = tempo_ratio.unwrap_or(1.0);
    let total_error: f64 = pairs
        .iter()
        .map(|(model_ms, candidate_ms)| {
            ((candidate_ms - candidate_first) / ratio - (model_ms - model_first)).abs()
        })
        .sum();

    TimingSummary {
        tempo_ratio,
        mean_onset_error_ms: Some(total_error / pairs.len() as f64),
        matched_pairs: pairs.len(),
    }
}
