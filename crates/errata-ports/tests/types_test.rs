use errata_ports::{pitch_name, CrossRefKey, OnsetWindow, Rect, SettingsDto, StaffId};

#[test]
fn rect_new_normalizes_corners() {
    let rect = Rect::new(10.0, 20.0, 4.0, 2.0);
    assert_eq!(rect, Rect::new(4.0, 2.0, 10.0, 20.0));
    assert_eq!(rect.width(), 6.0);
    assert_eq!(rect.height(), 18.0);
}

#[test]
fn rect_union_and_intersects() {
    let a = Rect::new(0.0, 0.0, 2.0, 2.0);
    let b = Rect::new(5.0, 1.0, 6.0, 3.0);
    assert!(!a.intersects(&b));
    assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 6.0, 3.0));
    assert!(a.intersects(&Rect::new(2.0, 2.0, 3.0, 3.0)));
}

#[test]
fn cross_ref_keys_compare_by_location() {
    assert_eq!(
        CrossRefKey::from_location(12, 4),
        CrossRefKey::from_location(12, 4)
    );
    assert_ne!(
        CrossRefKey::from_location(12, 4),
        CrossRefKey::from_location(4, 12)
    );
}

#[test]
fn pitch_names_use_scientific_octaves() {
    assert_eq!(pitch_name(60), "C4");
    assert_eq!(pitch_name(69), "A4");
    assert_eq!(pitch_name(70), "Bb4");
    assert_eq!(pitch_name(0), "C-1");
}

#[test]
fn unnamed_staff_convention() {
    assert_eq!(StaffId::unnamed().as_str(), "unnamed-staff");
}

#[test]
fn settings_fill_missing_fields_with_defaults() {
    let settings: SettingsDto =
        serde_json::from_str(r#"{ "gap_cost": 5, "onset_window": { "ticks": 30 } }"#)
            .expect("settings should parse");
    assert_eq!(settings.gap_cost, 5);
    assert_eq!(settings.wrong_pitch_cost, 3);
    assert_eq!(settings.onset_window, OnsetWindow::Ticks(30));
    assert_eq!(settings.chord_spread_ms, 50);
    assert_eq!(settings.colors.missing, "#e53935");
}

#[test]
fn unbounded_window_parses_from_plain_string() {
    let settings: SettingsDto = serde_json::from_str(r#"{ "onset_window": "unbounded" }"#)
        .expect("settings should parse");
    assert_eq!(settings.onset_window, OnsetWindow::Unbounded);
}
