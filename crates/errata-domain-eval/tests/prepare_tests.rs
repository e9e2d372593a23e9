use errata_domain_eval::{
    filter_candidate, normalize_ticks, sort_simultaneous, CandidateFilter, FilterStats, TickMap,
};
use errata_domain_score::TempoMap;
use errata_ports::midi::NoteEvent;
use pretty_assertions::assert_eq;

fn note(tick: i64, pitch: u8, duration: i64, velocity: u8) -> NoteEvent {
    NoteEvent {
        tick,
        pitch,
        duration,
        channel: 0,
        velocity,
    }
}

#[test]
fn close_onsets_are_sorted_by_pitch() {
    let tempo = TempoMap::new(480, Vec::new());
    // 48 ticks is 50 ms at the default tempo
    let played = vec![
        note(0, 67, 100, 80),
        note(20, 60, 100, 80),
        note(48, 64, 100, 80),
        note(49, 55, 100, 80),
    ];

    let pitches: Vec<u8> = sort_simultaneous(&played, &tempo, 50)
        .iter()
        .map(|n| n.pitch)
        .collect();
    assert_eq!(pitches, vec![60, 64, 67, 55]);
}

#[test]
fn candidate_filters_count_what_they_drop() {
    let tempo = TempoMap::new(480, Vec::new());
    let model = vec![note(0, 60, 240, 80), note(480, 67, 240, 80)];
    let candidate = vec![
        note(0, 60, 240, 80),
        note(100, 62, 240, 20),
        note(200, 57, 240, 80),
        note(300, 58, 240, 80),
        note(400, 64, 10, 80),
    ];
    let filter = CandidateFilter {
        min_velocity: Some(40),
        min_duration_ms: Some(30),
        pitch_margin: Some(2),
    };

    let (kept, stats) = filter_candidate(candidate, &tempo, &model, &filter);

    let pitches: Vec<u8> = kept.iter().map(|n| n.pitch).collect();
    assert_eq!(pitches, vec![60, 58]);
    assert_eq!(
        stats,
        FilterStats {
            velocity: 1,
            duration: 1,
            pitch_range: 1,
        }
    );
}

#[test]
fn candidate_ticks_follow_the_model_axis() {
    let model = vec![note(960, 60, 480, 80), note(1440, 62, 480, 80)];
    let candidate = vec![note(100, 60, 96, 80), note(196, 62, 96, 80)];

    let ticks: Vec<(i64, i64)> = normalize_ticks(&candidate, 96, &model, 480, false)
        .iter()
        .map(|n| (n.tick, n.duration))
        .collect();
    assert_eq!(ticks, vec![(960, 480), (1440, 480)]);
}

#[test]
fn tick_map_follows_local_tempo_between_anchors() {
    let map = TickMap::from_pairs([(0, 0), (600, 480), (1080, 960)]);

    assert_eq!(map.map(300), 240);
    assert_eq!(map.map(840), 720);
    // outside the anchors the nearest offset is kept
    assert_eq!(map.map(-100), -100);
    assert_eq!(map.map(1180), 1060);
}

#[test]
fn tick_map_skips_crossing_and_implausible_anchors() {
    let map = TickMap::from_pairs([
        (0, 0),
        (5, 0),
        (480, 480),
        (500, 400),
        (5000, 960),
        (960, 960),
    ]);

    assert_eq!(map.anchors(), &[(0, 0), (480, 480), (960, 960)]);

    let empty = TickMap::from_pairs(Vec::new());
    assert_eq!(empty.map(123), 123);
}
