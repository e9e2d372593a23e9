use errata_domain_score::{parse_note_log, staff_from_path, NoteLogError};
use errata_ports::types::{CrossRefKey, StaffId};
use pretty_assertions::assert_eq;
use std::path::Path;

const LOG: &str = "\
0.0\ttempo\t120
0.0\tnote\t60\t0.25\t0.75\tpoint-and-click 3 10
0.25\tnote\t64\t0.25\t0.75\tpoint-and-click 5 10
0.25\tnote\t67\t0.25\t0.75\tpoint-and-click 5 10\t2
0.5\trest\t0.25
";

#[test]
fn note_log_keeps_note_records_in_emission_order() {
    let log = parse_note_log(StaffId::unnamed(), LOG, 480).expect("log should parse");

    let entries: Vec<(i64, u8, &str)> = log
        .entries
        .iter()
        .map(|e| (e.tick, e.pitch, e.voice.as_str()))
        .collect();
    assert_eq!(entries, vec![(0, 60, "1"), (480, 64, "1"), (480, 67, "2")]);
    assert_eq!(log.entries[0].key, CrossRefKey::from_location(10, 3));
    assert_eq!(log.entries[1].key, log.entries[2].key);
}

#[test]
fn grace_notes_sort_before_their_main_note() {
    let text = "0.25-0.0625\tnote\t62\t0.0625\t0.75\tpoint-and-click 1 4\n";
    let log = parse_note_log(StaffId::unnamed(), text, 480).expect("log should parse");
    assert_eq!(log.entries[0].tick, 360);
}

#[test]
fn rational_moments_are_accepted() {
    let text = "3/4\tnote\t62\t1/4\t0.75\tpoint-and-click 1 4\n";
    let log = parse_note_log(StaffId::unnamed(), text, 96).expect("log should parse");
    assert_eq!(log.entries[0].tick, 288);
}

#[test]
fn malformed_point_and_click_is_fatal() {
    let text = "0.0\tnote\t60\t0.25\t0.75\tpoint-and-click 3\n";
    let err = parse_note_log(StaffId::new("upper"), text, 480).expect_err("should fail");
    match err {
        NoteLogError::Parse { staff, line, .. } => {
            assert_eq!(staff, StaffId::new("upper"));
            assert_eq!(line, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn staff_name_comes_from_file_stem() {
    assert_eq!(
        staff_from_path(Path::new("/tmp/out/soprano.notes")),
        StaffId::new("soprano")
    );
    assert_eq!(
        staff_from_path(Path::new("unnamed-staff.notes")),
        StaffId::unnamed()
    );
}
